use std::{env, env::VarError};

/// There's no real CLI for the gateway, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print. File transfer passwords live in the database, but the accounts
    // endpoint may carry credentials, so it is masked below.
    const DISPLAY_ENVS: [&str; 13] = [
        "RUST_LOG",
        "AGW_HOST",
        "AGW_PORT",
        "AGW_DATABASE_URL",
        "AGW_STORAGE_DIR",
        "AGW_FILE_TRANSFER_INTERVAL",
        "AGW_MAX_LINES_PER_FILE",
        "AGW_FORCED_CUTOFF_UPLOAD_DELTA",
        "AGW_TRANSFER_BATCH_SIZE",
        "AGW_TEMP_DOWNLOAD_DIR",
        "AGW_DELETE_REMOTE_FILES",
        "AGW_ACCOUNTS_ENDPOINT",
        "AGW_ACCOUNTS_TIMEOUT",
    ];

    println!("Current environment values:");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) if name == "AGW_ACCOUNTS_ENDPOINT" => mask_userinfo(&s),
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}

/// Hides any `user:password@` part of a URL.
fn mask_userinfo(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => format!("{}://****@{}", &url[..scheme], &url[at + 1..]),
        _ => url.to_string(),
    }
}
