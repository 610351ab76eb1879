use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{exit, Command};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const LAMBDA_PACKAGE: &str = "iam_provisioning_lambda";
const LAMBDA_BINARY: &str = "provisioning_lambda";
const POLICY_DOCUMENT: &str = "crates/iam_provisioning_lambda/policy.json";
const DIST_DIR: &str = "dist";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the IAM provisioning workspace",
    long_about = "Builds and packages the provisioning Lambda and runs CI checks\n\
                  for the IAM provisioning workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Build the provisioning Lambda and package it with its policy document
    LambdaPackage {
        /// Compilation target triple for the Lambda binary
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build the binary without optimizations
        #[arg(long)]
        debug: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Build the Lambda binary for the host
    Package,
    /// Run check + package
    All,
}

// ── lambda build ───────────────────────────────────────────────────

/// Cross-compiled provisioning Lambda binary for one target triple.
struct LambdaBuild {
    target: String,
    release: bool,
}

impl LambdaBuild {
    fn cargo_args(&self) -> Vec<&str> {
        let mut args = vec![
            "build",
            "-p",
            LAMBDA_PACKAGE,
            "--bin",
            LAMBDA_BINARY,
            "--target",
            self.target.as_str(),
        ];
        if self.release {
            args.push("--release");
        }
        args
    }

    fn binary_path(&self) -> PathBuf {
        let profile_dir = if self.release { "release" } else { "debug" };
        Path::new("target")
            .join(&self.target)
            .join(profile_dir)
            .join(LAMBDA_BINARY)
    }
}

/// Runs cargo under a section header and stops xtask on the first failure.
fn run_cargo(label: &str, args: &[&str]) {
    eprintln!("\n=== {label} ===\n+ cargo {}", args.join(" "));
    let status = match Command::new("cargo").args(args).status() {
        Ok(status) => status,
        Err(error) => fail(&format!("failed to execute cargo: {error}")),
    };
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn fail(message: &str) -> ! {
    eprintln!("error: {message}");
    exit(1);
}

/// `None` when rustup is unavailable, in which case the build itself reports
/// a missing target.
fn installed_targets() -> Option<Vec<String>> {
    let output = Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect(),
    )
}

fn package_provisioning_lambda(build: &LambdaBuild) {
    match installed_targets() {
        Some(targets) if !targets.iter().any(|target| *target == build.target) => fail(&format!(
            "rust target `{0}` is not installed; run `rustup target add {0}` and retry",
            build.target
        )),
        Some(_) => {}
        None => eprintln!("warning: could not list rustup targets; skipping target check"),
    }

    run_cargo("Build provisioning lambda binary", &build.cargo_args());

    let dist_dir = Path::new(DIST_DIR);
    if let Err(error) = fs::create_dir_all(dist_dir) {
        fail(&format!("failed to create '{}': {error}", dist_dir.display()));
    }
    let zip_path = dist_dir.join(format!("{LAMBDA_BINARY}.zip"));

    if let Err(message) =
        package_lambda_zip(&build.binary_path(), Path::new(POLICY_DOCUMENT), &zip_path)
    {
        fail(&message);
    }

    eprintln!("\nPackaged artifact:\n- {}", zip_path.display());
}

/// Writes `bootstrap` and `policy.json` side by side, which is where the
/// handler looks for the document under `LAMBDA_TASK_ROOT`.
fn package_lambda_zip(
    binary_path: &Path,
    policy_path: &Path,
    zip_path: &Path,
) -> Result<(), String> {
    let binary = fs::read(binary_path).map_err(|error| {
        format!(
            "failed to read lambda binary at '{}': {error}",
            binary_path.display()
        )
    })?;
    let policy = fs::read(policy_path).map_err(|error| {
        format!(
            "failed to read policy document at '{}': {error}",
            policy_path.display()
        )
    })?;
    serde_json::from_slice::<serde_json::Value>(&policy).map_err(|error| {
        format!(
            "policy document at '{}' is not valid JSON: {error}",
            policy_path.display()
        )
    })?;

    let file = fs::File::create(zip_path)
        .map_err(|error| format!("failed to create '{}': {error}", zip_path.display()))?;
    let mut zip = ZipWriter::new(file);
    let entries: [(&str, &[u8], u32); 2] = [
        ("bootstrap", &binary, 0o755),
        ("policy.json", &policy, 0o644),
    ];
    for (name, contents, mode) in entries {
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(mode);
        zip.start_file(name, options)
            .and_then(|()| zip.write_all(contents).map_err(Into::into))
            .map_err(|error| format!("failed to write '{name}' into lambda zip: {error}"))?;
    }
    zip.finish()
        .map_err(|error| format!("failed to finish lambda zip: {error}"))?;
    Ok(())
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    run_cargo("Check formatting", &["fmt", "--all", "--", "--check"]);
    run_cargo(
        "Clippy",
        &[
            "clippy",
            "--all-targets",
            "--all-features",
            "--",
            "-D",
            "warnings",
        ],
    );
    run_cargo(
        "Test iam_provisioning_core",
        &["test", "-p", "iam_provisioning_core"],
    );
    run_cargo("Test iam_provisioning_lambda", &["test", "-p", LAMBDA_PACKAGE]);
}

fn ci_package() {
    run_cargo(
        "Build lambda binary",
        &["build", "-p", LAMBDA_PACKAGE, "--bin", LAMBDA_BINARY],
    );
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Package => ci_package(),
                CiJob::All => {
                    ci_check();
                    ci_package();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::LambdaPackage { target, debug } => {
            package_provisioning_lambda(&LambdaBuild {
                target,
                release: !debug,
            });
        }
    }
}
