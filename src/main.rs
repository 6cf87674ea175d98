use std::path::PathBuf;

const HELP: &str = "pixfeed — Browse an image feed from the terminal.

  --link <URL>         Open at the post named by the URL's postId parameter
  --post-id <ID>       Open at the given post (same as --link with share.base_url)
  --config <PATH>      Read configuration from PATH
  --list               Print the feed and exit
  --version, -V        Show version and exit
  --help,    -h        Show this help message";

enum Command {
    Run(pixfeed::RunOptions),
    Exit,
}

fn main() {
    let opts = match parse_args(std::env::args().skip(1)) {
        Ok(Command::Run(opts)) => opts,
        Ok(Command::Exit) => return,
        Err(message) => {
            eprintln!("error: {message}\n\n{HELP}");
            std::process::exit(2);
        }
    };

    if let Err(err) = pixfeed::run(opts) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Command, String> {
    let mut opts = pixfeed::RunOptions::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("pixfeed {}", pixfeed::VERSION);
                return Ok(Command::Exit);
            }
            "--help" | "-h" => {
                println!("{HELP}");
                return Ok(Command::Exit);
            }
            "--list" => opts.list = true,
            "--link" => opts.link = Some(value(&mut args, "--link")?),
            "--post-id" => opts.post_id = Some(value(&mut args, "--post-id")?),
            "--config" => opts.config_file = Some(PathBuf::from(value(&mut args, "--config")?)),
            other => return Err(format!("unknown argument {other:?}")),
        }
    }
    Ok(Command::Run(opts))
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
    args.next()
        .filter(|value| !value.starts_with("--"))
        .ok_or_else(|| format!("{flag} requires a value"))
}
