use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Parser;

#[derive(Parser, Debug)]
struct Cli {
    /// Working directory, with config files.
    #[clap(short, long, default_value = "data")]
    dir: PathBuf,

    #[clap(subcommand)]
    cmd: Cmd,
}

#[derive(clap::Subcommand, Debug)]
enum Cmd {
    /// Run the API server.
    Server,
    /// Print a signed service-account assertion, for debugging the
    /// Google credential without starting the server.
    Assertion,
    /// Send a single OTP email and print the code.
    SendOtp { email: String, username: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    human_panic_setup();
    let cli = Cli::parse();
    set_current_dir(&cli.dir)?;
    lyxenime::tracing::init()?;
    tracing::debug!(?cli, "Starting.");
    match &cli.cmd {
        Cmd::Server => lyxenime::server::run().await,
        Cmd::Assertion => {
            let conf = lyxenime::conf::global();
            let claims = lyxenime::jwt::Claims::new(
                &conf.analytics.client_email,
                &conf.analytics.token_uri,
                lyxenime::jwt::ASSERTION_TTL,
            )?;
            let signed: String =
                claims.sign(&conf.analytics.private_key_pem)?;
            println!("{signed}");
            Ok(())
        }
        Cmd::SendOtp { email, username } => {
            let conf = lyxenime::conf::global();
            let mailer = lyxenime::mail::Mailer::new(&conf.smtp)?;
            let otp = lyxenime::otp::Otp::generate();
            mailer.send_otp(email, username, &otp).await?;
            println!("{otp}");
            Ok(())
        }
    }
}

fn set_current_dir(path: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(path)
        .context(format!("Failed to create directory path: {path:?}"))?;
    env::set_current_dir(path)
        .context(format!("Failed to set current directory to {path:?}"))?;
    Ok(())
}

fn human_panic_setup() {
    macro_rules! repo {
        () => {
            env!("CARGO_PKG_REPOSITORY")
        };
    }
    human_panic::setup_panic!(human_panic::Metadata::new(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
    .authors(env!("CARGO_PKG_AUTHORS"))
    .homepage(repo!())
    .support(concat!("- Submit an issue at ", repo!(), "/issues")));
}
