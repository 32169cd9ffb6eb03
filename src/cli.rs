//! Shared argument handling for the binaries.

use std::ffi::OsString;

/// Rewrites the two-letter `-p0` flag used by the pipeline scripts into the
/// long `--p0` alias; clap only accepts single-character short flags.
pub fn legacy_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some("-p0") => OsString::from("--p0"),
            Some(s) if s.starts_with("-p0=") => OsString::from(format!("-{s}")),
            _ => arg,
        })
        .collect()
}
