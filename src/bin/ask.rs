use anyhow::{anyhow, Result};
use env_logger;

use fmr_assistant::config;
use fmr_assistant::domain::Category;
use fmr_assistant::initialization::initialize_pipeline;
use fmr_assistant::server::render_answer;

const USAGE: &str = "usage: ask [--category <all|islamic|conventional>] <question...>";

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<(Category, String)> {
    let mut category = Category::All;
    let mut words = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--category" | "-c" => {
                let value = args.next().ok_or_else(|| anyhow!("--category needs a value\n{}", USAGE))?;
                category = value.parse()?;
            }
            "--help" | "-h" => return Err(anyhow!(USAGE)),
            _ => words.push(arg),
        }
    }
    if words.is_empty() {
        return Err(anyhow!(USAGE));
    }
    Ok((category, words.join(" ")))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let (category, question) = parse_args(std::env::args().skip(1))?;
    let config = config::load_config()?;
    let pipeline = initialize_pipeline(&config).await?;

    let result = pipeline.answer(&question, category).await;
    println!("{}", render_answer(&result));
    Ok(())
}
