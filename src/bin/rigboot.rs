use anyhow::Result;

fn main() -> Result<()> {
    rigboot::cli::run(rigboot::cli::CliMode::Boot)
}
