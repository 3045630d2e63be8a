mod hook;
mod scenario;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "--hook" {
        hook::run()
    } else {
        scenario::run()
    }
}
