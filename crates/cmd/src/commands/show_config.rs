use std::collections::BTreeMap;
use std::io::Write;

use annostore::{PathnameParams, Settings};
use anyhow::Result;
use dataset::ViewType;
use serde::Serialize;

use crate::common::CliContext;

#[derive(Serialize)]
struct ConfigReport<'a> {
    settings: &'a Settings,
    dashboards: BTreeMap<&'static str, PathnameParams>,
    login_path: String,
}

/// Print the effective settings as YAML
///
/// The report also carries each dashboard's URL prefixes and the login route.
pub fn show_config_command(ctx: &CliContext, out: &mut impl Write) -> Result<()> {
    let dashboards = ViewType::ALL
        .into_iter()
        .filter(|v| *v != ViewType::Cellxgene)
        .map(|v| (v.name(), ctx.settings.pathname_params(v.url())))
        .collect();

    let report = ConfigReport {
        settings: &ctx.settings,
        dashboards,
        login_path: dataset::access::login_path(&ctx.settings),
    };
    write!(out, "{}", serde_yaml_ng::to_string(&report)?)?;
    Ok(())
}
