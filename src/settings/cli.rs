use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "toolshelf", about = "Local bookmark cache bridge for the tool catalog")]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,
    /// Overrides `http.address` from the settings file.
    #[arg(long)]
    pub address: Option<String>,
}
