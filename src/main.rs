use acr_toolkit::cli::{Args, Runner};
use acr_toolkit::logging::init_tracing;
use acr_toolkit::Logger;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse_args();
    init_tracing(args.verbose);

    let runner = match Runner::new(args) {
        Ok(runner) => runner,
        Err(e) => {
            Logger::new(false).error(&format!("{}", e));
            std::process::exit(2);
        }
    };

    if let Err(e) = runner.run().await {
        if e.is_cancelled() {
            runner.output().warning("Operation cancelled");
            std::process::exit(130);
        }
        runner.output().error(&format!("{}", e));
        std::process::exit(1);
    }

    Ok(())
}
