//! A packaged application for the `exploder` bootstrap.
//!
//! Build it, put the resulting shared library in an archive next to a
//! manifest naming one of its entry points, and append the archive to the
//! `exploder` binary:
//!
//! ```text
//! Manifest-Version: 1.0
//! Start-Class: demo.Hello
//! ```

use std::io::Write;

use anyhow::{bail, Context};

fn hello(args: &[String]) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", greeting(args))?;
    Ok(())
}

fn cat(args: &[String]) -> anyhow::Result<()> {
    if args.is_empty() {
        bail!("demo.Cat needs at least one file to print");
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for path in args {
        let data = std::fs::read(path).with_context(|| format!("Could not read `{}`", path))?;
        out.write_all(&data)?;
    }
    out.flush()?;
    Ok(())
}

fn greeting(args: &[String]) -> String {
    match args {
        [] => "Hello from inside the archive!".to_string(),
        names => format!("Hello, {}!", names.join(" and ")),
    }
}

exploder_abi::export_table! {
    pub static EXPORTS = {
        "demo.Hello" => hello,
        "demo.Cat" => cat,
    };
}

exploder_abi::export_library!(EXPORTS);
