use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for hearth")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// fmt, clippy, tests and docs, stopping at the first failure
    Check,
    Fmt,
    Clippy,
    Test,
    Doc,
    /// Write the sample model into a data directory, hash it and validate it
    Sample {
        #[arg(default_value = "./data")]
        dir: String,
    },
    /// Launch the viewer on a data directory
    View {
        #[arg(default_value = "./data")]
        dir: String,
        /// Extra arguments passed to the viewer
        #[arg(last = true)]
        args: Vec<String>,
    },
}

fn cargo(step: &str, args: &[&str]) -> Result<()> {
    println!("==> {step}: cargo {}", args.join(" "));
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        bail!("{step} failed ({status})");
    }
    Ok(())
}

fn fmt() -> Result<()> {
    cargo("fmt", &["fmt", "--all", "--", "--check"])
}

fn clippy() -> Result<()> {
    cargo(
        "clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
    )
}

fn test() -> Result<()> {
    cargo("test", &["test", "--workspace"])
}

fn doc() -> Result<()> {
    cargo("doc", &["doc", "--workspace", "--no-deps"])
}

fn sample(dir: &str) -> Result<()> {
    let cli = ["run", "-q", "-p", "hearth-cli", "--"];
    let mut write = cli.to_vec();
    write.extend(["sample", dir]);
    cargo("sample", &write)?;
    let mut validate = cli.to_vec();
    validate.extend(["validate", dir, "--write-manifest"]);
    cargo("validate", &validate)
}

fn view(dir: &str, extra: &[String]) -> Result<()> {
    let mut args = vec!["run", "-p", "hearth-viewer", "--", "--data-dir", dir];
    args.extend(extra.iter().map(String::as_str));
    cargo("view", &args)
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Commands::Check => {
            fmt()?;
            clippy()?;
            test()?;
            doc()?;
        }
        Commands::Fmt => fmt()?,
        Commands::Clippy => clippy()?,
        Commands::Test => test()?,
        Commands::Doc => doc()?,
        Commands::Sample { dir } => sample(&dir)?,
        Commands::View { dir, args } => view(&dir, &args)?,
    }
    Ok(())
}
