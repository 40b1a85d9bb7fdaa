use notesload_runtime::LoadTestRuntime;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> ExitCode {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("notesload=info,notesload_runtime=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let outcome = match LoadTestRuntime::from_args() {
        Ok(runtime) => runtime.run().await,
        Err(err) => Err(err),
    };

    match outcome {
        Ok(outcome) => {
            println!("{}", outcome.summary);
            for result in &outcome.verdict.results {
                println!(" {result}");
            }

            if outcome.passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
