use waymark::config::Config;

fn main() -> Result<(), serde_json::Error> {
    let config = Config::default();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
