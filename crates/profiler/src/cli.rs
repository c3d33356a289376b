pub const USAGE: &str = "\
usage: profiler [run] [--config PATH] [--addresses PATH] [--output PATH]

Profiles every wallet listed in the address file across the configured chains
and writes a CSV report. Flags override the matching config values.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    pub config: Option<String>,
    pub addresses: Option<String>,
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(RunArgs),
    Help,
}

pub fn parse_args<I>(mut args: I) -> std::result::Result<Command, String>
where
    I: Iterator<Item = String>,
{
    // Drop argv[0].
    let _ = args.next();

    let mut run = RunArgs::default();
    let mut first = true;

    while let Some(arg) = args.next() {
        let is_first = std::mem::replace(&mut first, false);
        match arg.as_str() {
            "run" if is_first => {}
            "help" | "-h" | "--help" => return Ok(Command::Help),
            "--config" => run.config = Some(flag_value(&mut args, "--config")?),
            "--addresses" => run.addresses = Some(flag_value(&mut args, "--addresses")?),
            "--output" => run.output = Some(flag_value(&mut args, "--output")?),
            other => return Err(format!("unknown argument: {other}\n\n{USAGE}")),
        }
    }

    Ok(Command::Run(run))
}

fn flag_value<I>(args: &mut I, flag: &str) -> std::result::Result<String, String>
where
    I: Iterator<Item = String>,
{
    args.next()
        .filter(|v| !v.starts_with("--"))
        .ok_or_else(|| format!("{flag} requires a value"))
}
