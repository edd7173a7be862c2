use crate::Context;
use crate::cli::PushArgs;
use crate::ui;
use anyhow::{Context as _, Result, bail};
use std::fs;

/// Parse octal permission bits such as `644` or `0755`
fn parse_mode(mode: &str) -> Result<u32> {
    let bits = u32::from_str_radix(mode, 8).with_context(|| format!("Invalid mode '{mode}'"))?;
    if bits > 0o7777 {
        bail!("Invalid mode '{mode}': more than permission bits");
    }
    Ok(bits)
}

pub fn run(ctx: &Context, args: &PushArgs) -> Result<()> {
    let mode = parse_mode(&args.mode)?;
    let content = fs::read(&args.local)
        .with_context(|| format!("Could not read {}", args.local.display()))?;
    let inventory = ctx.load_inventory()?;
    let hosts = inventory.select(args.host.as_deref())?;
    let mut failed = 0;

    for host in &hosts {
        match host.put(&content, &args.remote, mode) {
            Ok(()) => {
                if !ctx.quiet {
                    ui::success(&format!(
                        "{}: {} bytes to {} ({mode:04o})",
                        host.name,
                        content.len(),
                        args.remote
                    ));
                }
            }
            Err(e) => {
                ui::error(&format!("{}: {e:#}", host.name));
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("Push failed on {failed} of {} hosts", hosts.len());
    }
    Ok(())
}
