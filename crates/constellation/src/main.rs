//! Just `main()`. Keep as small as possible.

use color_eyre::eyre::Result;

#[expect(
    clippy::print_stderr,
    reason = "STDOUT belongs to the host, so STDERR is our only way of telling the user anything"
)]
#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let result = constellation::run::run().await;
    tracing::debug!("Constellation is exiting");

    if let Err(error) = result {
        tracing::error!("{error:?}");
        eprintln!("Error: {error}");
        return Err(error);
    }

    Ok(())
}
