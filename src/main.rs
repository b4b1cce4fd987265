use std::io::{self, Write};
use std::process;

use displaymode::cli::{self, Opt};
use displaymode::platform::SystemDisplays;
use log::debug;
use structopt::StructOpt;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let opt = Opt::from_args();
    env_logger::Builder::new()
        .filter_level(opt.log_level())
        .parse_default_env()
        .init();
    debug!("{:?}", opt);

    let mut displays = SystemDisplays::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = cli::run(&mut displays, &opt, &mut out);
    out.flush()?;

    if let Err(err) = result {
        cli::write_error(&err, &mut io::stderr())?;
        process::exit(err.exit_code());
    }

    Ok(())
}
