use calrisk::cli::commands::{budget, completions, convert, lookup, risk, units};
use calrisk::cli::{Cli, Commands};
use clap::Parser;
use miette::Result;

fn main() -> Result<()> {
    // Terminate quietly on a closed pipe (`calrisk budget x.yaml | head`)
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;

    match cli.command {
        Commands::Units(args) => units::run(args, &global),
        Commands::Convert(cmd) => convert::run(cmd, &global),
        Commands::Budget(args) => budget::run(args, &global),
        Commands::Risk(args) => risk::run(args, &global),
        Commands::Lookup(args) => lookup::run(args, &global),
        Commands::Completions(args) => completions::run(args),
    }
}
