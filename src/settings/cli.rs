use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "tokenward", about = "Anchored JWT session node")]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,
}
