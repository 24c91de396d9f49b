use tokenward::server::{jwt_config, strategy_config};
use tokenward::settings::*;

fn main() -> anyhow::Result<()> {
    // $ cargo run --bin settings_demo -- --settings=settings/dev.toml
    let cli = Cli::parse();
    let project_settings = parse_settings(cli.settings.as_deref())?;
    println!("Loaded settings: {:?}", project_settings);

    let jwt = jwt_config(&project_settings.jwt, &project_settings.session)?;
    println!("Sign defaults: {:?}", jwt.sign);
    println!("Verify defaults: {:?}", jwt.verify);
    println!("Strategy: {:?}", strategy_config(&project_settings.session));

    // Attempt to load from an invalid path (expected to fail)
    let is_err = parse_settings(Some("")).is_err();
    println!("Error on invalid path: {:?}", is_err);

    Ok(())
}
