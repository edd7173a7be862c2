use crate::Context;
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use hostkit::HostKind;

pub fn run(ctx: &Context) -> Result<()> {
    let inventory = ctx.load_inventory()?;

    if inventory.hosts.is_empty() {
        ui::warn("Inventory has no hosts");
        return Ok(());
    }

    for host in &inventory.hosts {
        let kind = match host.kind {
            HostKind::Local => "local".green(),
            HostKind::Remote => "remote".cyan(),
        };
        println!("{:<20} {:<8} {}", host.name.bold(), kind, host.describe());
        if ctx.verbose > 0 {
            if let Some(var) = &host.secret_env {
                ui::kv("secret", &format!("${var}"));
            }
            if let Some(server) = &host.sftp_server {
                ui::kv("sftp-server", server);
            }
        }
    }
    Ok(())
}
