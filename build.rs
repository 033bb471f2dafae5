// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: target filesystem root
fn path_arg() -> Arg {
    Arg::new("path")
        .long("path")
        .value_name("DIR")
        .default_value("/")
        .help("Target filesystem root")
}

/// Common argument: mutable state directory
fn statedir_arg() -> Arg {
    Arg::new("statedir")
        .long("statedir")
        .value_name("DIR")
        .default_value("/var/lib/swup")
        .help("Mutable state directory")
}

fn build_cli() -> Command {
    Command::new("swup")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Software updater for image-based OS installs")
        .subcommand_required(false)
        .arg(path_arg().global(true))
        .arg(statedir_arg().global(true))
        .arg(
            Arg::new("url")
                .long("url")
                .value_name("URL")
                .global(true)
                .help("Content server URL (or local mirror path)"),
        )
        .arg(
            Arg::new("versionurl")
                .long("versionurl")
                .value_name("URL")
                .global(true)
                .help("Version server URL"),
        )
        .arg(
            Arg::new("nosigcheck")
                .long("nosigcheck")
                .action(clap::ArgAction::SetTrue)
                .global(true)
                .help("Skip MoM signature verification"),
        )
        .subcommand(Command::new("list").about("List all installable bundles"))
        .subcommand(
            Command::new("install")
                .about("Install one or more bundles and their includes")
                .arg(
                    Arg::new("bundles")
                        .required(true)
                        .num_args(1..)
                        .help("Bundle name(s)"),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove an installed bundle, keeping shared files")
                .arg(Arg::new("bundle").required(true).help("Bundle name")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("swup.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
