use toolshelf::settings::*;

fn main() -> anyhow::Result<()> {
    // Load settings from the default location
    let project_settings = parse_settings(None)?;
    println!("Loaded settings: {:?}", project_settings);

    // Attempt to load from an invalid path (expected to fail)
    let is_err = parse_settings(Some("")).is_err();
    println!("Error on invalid path: {:?}", is_err);

    // $ cargo run --bin settings_demo -- --settings=settings/release.toml
    let cli = Cli::parse();
    let project_settings = parse_settings(cli.settings.as_deref())?;
    println!(
        "Loaded settings: backend={} ids_ttl={}s records_ttl={}s page_size={}",
        project_settings.backend.kind,
        project_settings.cache.ids_ttl_secs,
        project_settings.cache.records_ttl_secs,
        project_settings.cache.page_size
    );

    Ok(())
}
