use crate::Context;
use crate::cli::ExecArgs;
use crate::ui;
use anyhow::{Result, bail};
use declarative::Target;

pub fn run(ctx: &Context, args: &ExecArgs) -> Result<()> {
    let inventory = ctx.load_inventory()?;
    let hosts = inventory.select(args.host.as_deref())?;
    let show_headers = hosts.len() > 1 || ctx.verbose > 0;
    let mut failed = 0;

    for host in &hosts {
        let target = match host.connect() {
            Ok(target) => target,
            Err(e) => {
                ui::error(&format!("{}: {e:#}", host.name));
                failed += 1;
                continue;
            }
        };
        let target: Box<dyn Target> = match &args.as_user {
            Some(user) => target.as_user(user),
            None => target,
        };

        if show_headers && !ctx.quiet {
            ui::section(&format!("{} ({} as {})", host.name, target, target.user()));
        }

        match target.run(&args.command, &args.stdin) {
            Ok(response) => {
                if !response.stdout.is_empty() {
                    println!("{}", response.stdout);
                }
                if !response.stderr.is_empty() {
                    eprintln!("{}", response.stderr);
                }
                if !response.success() {
                    ui::warn(&format!(
                        "{}: exited with status {}",
                        host.name, response.exit_status
                    ));
                    failed += 1;
                }
            }
            Err(e) => {
                ui::error(&format!("{}: {e:#}", host.name));
                failed += 1;
            }
        }

        if let Err(e) = target.close() {
            log::warn!("Failed to close {}: {e:#}", host.name);
        }
    }

    if failed > 0 {
        bail!("Command failed on {failed} of {} hosts", hosts.len());
    }
    Ok(())
}
