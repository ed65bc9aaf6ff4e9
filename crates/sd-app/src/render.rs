//! Plain-text rendering of the dashboard panels

use std::fmt::{self, Write};

use sd_core::format::{exclusion_label, format_count, format_dollars, format_month};
use sd_core::NavigationHistory;
use sd_data::schema::Overview;
use sd_data::{Keyed, RemoteError, SortDir};
use sd_views::{Dashboard, ListState, Loadable};

const RULE: &str = "----------------------------------------------------------------";

pub fn render<H: NavigationHistory>(dashboard: &Dashboard<H>) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_dashboard(&mut out, dashboard)?;
    Ok(out)
}

fn write_dashboard<H: NavigationHistory>(out: &mut String, dashboard: &Dashboard<H>) -> fmt::Result {
    let selection = dashboard.store().get();

    writeln!(out, "{}", dashboard.url().current())?;
    if selection.aux.show_only_flagged {
        writeln!(out, "(flagged providers only)")?;
    }
    writeln!(out, "{RULE}")?;
    overview(out, &dashboard.overview().snapshot())?;

    if selection.focused_entity().is_some() {
        let panel = dashboard.provider_panel();
        let detail = panel.detail();
        match (&detail.value, &detail.error) {
            (Some(p), _) => {
                writeln!(out, "\n{} (NPI {})", p.name, p.npi)?;
                writeln!(out, "  {}", location(p.city.as_deref(), p.state.as_deref()))?;
                writeln!(
                    out,
                    "  paid {}  claims {}  beneficiaries {}",
                    format_dollars(p.total_paid),
                    format_count(p.total_claims),
                    format_count(p.total_beneficiaries)
                )?;
                writeln!(
                    out,
                    "  billing {} to {}",
                    format_month(&p.first_month),
                    format_month(&p.last_month)
                )?;
                if let Some(exclusion) = &p.exclusion {
                    writeln!(
                        out,
                        "  EXCLUDED: {} since {}",
                        exclusion_label(&exclusion.exclusion_type),
                        exclusion.exclusion_date
                    )?;
                }
            }
            (None, Some(err)) => error(out, "provider", err)?,
            (None, None) => {
                writeln!(out, "\nloading provider...")?;
            }
        }
        list(out, "Procedures billed", &panel.procedures().snapshot(), |p| {
            format!("{:<8} {:<44} {}", p.hcpcs_code, truncate(&p.description, 44), format_dollars(p.total_paid))
        })?;
    } else if selection.focused_category().is_some() {
        let panel = dashboard.procedure_panel();
        let detail = panel.detail();
        match (&detail.value, &detail.error) {
            (Some(p), _) => {
                writeln!(
                    out,
                    "\n{} {}",
                    p.hcpcs_code,
                    p.description.as_deref().unwrap_or("")
                )?;
                writeln!(
                    out,
                    "  paid {}  providers {}",
                    format_dollars(p.total_paid),
                    format_count(p.unique_providers)
                )?;
            }
            (None, Some(err)) => error(out, "procedure", err)?,
            (None, None) => {
                writeln!(out, "\nloading procedure...")?;
            }
        }
        let title = match &selection.region {
            Some(region) => format!("Providers in {region}"),
            None => "Providers".to_string(),
        };
        list(out, &title, &panel.providers().snapshot(), |p| {
            format!(
                "{:<11} {:<36} {:<20} {}",
                p.npi,
                truncate(&p.name, 36),
                location(p.city.as_deref(), p.state.as_deref()),
                format_dollars(p.total_paid)
            )
        })?;
    } else {
        let title = match &selection.region {
            Some(region) => format!("Top providers in {region}"),
            None => "Top providers".to_string(),
        };
        list(out, &title, &dashboard.top_providers().snapshot(), |p| {
            let flag = match p.exclusion_type.as_deref() {
                Some(code) => format!("  [{}]", exclusion_label(code)),
                None => String::new(),
            };
            format!(
                "{:<11} {:<36} {:<20} {}{flag}",
                p.npi,
                truncate(&p.name, 36),
                location(p.city.as_deref(), p.state.as_deref()),
                format_dollars(p.total_paid)
            )
        })?;
        list(out, "Top procedures", &dashboard.top_procedures().snapshot(), |p| {
            format!(
                "{:<8} {:<44} {}",
                p.hcpcs_code,
                truncate(p.description.as_deref().unwrap_or(""), 44),
                format_dollars(p.total_paid)
            )
        })?;
    }

    timeseries(out, dashboard)?;
    reimbursement(out, dashboard)?;
    map(out, dashboard)
}

fn overview(out: &mut String, overview: &Loadable<(), Overview>) -> fmt::Result {
    match (&overview.value, &overview.error) {
        (Some(o), _) => {
            writeln!(
                out,
                "{} paid | {} claims | {} beneficiaries | {} providers | {} - {}",
                format_dollars(o.total_paid),
                format_count(o.total_claims),
                format_count(o.total_beneficiaries),
                format_count(o.total_providers),
                format_month(&o.first_month),
                format_month(&o.last_month)
            )?;
        }
        (None, Some(err)) => error(out, "overview", err)?,
        (None, None) => {}
    }
    Ok(())
}

fn list<R: Keyed + Clone>(
    out: &mut String,
    title: &str,
    state: &ListState<R>,
    row: impl Fn(&R) -> String,
) -> fmt::Result {
    writeln!(out, "\n{title}")?;
    if let Some(err) = state.error() {
        if state.records().is_empty() {
            return error(out, title, err);
        }
    }
    if state.records().is_empty() {
        return writeln!(out, "  {}", if state.is_loading() { "loading..." } else { "no results" });
    }
    for (i, record) in state.records().iter().enumerate() {
        writeln!(out, "{:>4}. {}", i + 1, row(record))?;
    }
    if state.has_more() {
        writeln!(out, "  ... more available (--more)")?;
    }
    if let Some(err) = state.error() {
        writeln!(out, "  could not load more: {err}")?;
    }
    Ok(())
}

fn timeseries<H: NavigationHistory>(out: &mut String, dashboard: &Dashboard<H>) -> fmt::Result {
    let series = dashboard.timeseries().snapshot();
    let Some(scope) = &series.key else {
        return Ok(());
    };
    writeln!(out, "\n{}", scope.title())?;
    match (&series.value, &series.error) {
        (Some(months), _) => {
            for month in months {
                writeln!(
                    out,
                    "  {:<9} {}",
                    format_month(&month.month),
                    format_dollars(month.total_paid)
                )?;
            }
        }
        (None, Some(err)) => error(out, "time series", err)?,
        (None, None) => {}
    }
    Ok(())
}

fn reimbursement<H: NavigationHistory>(out: &mut String, dashboard: &Dashboard<H>) -> fmt::Result {
    let chart = dashboard.reimbursement().snapshot();
    let Some(label) = &chart.label else {
        return Ok(());
    };
    let order = match chart.dir {
        SortDir::Desc => "highest",
        SortDir::Asc => "lowest",
    };
    writeln!(out, "\nAvg reimbursement per claim: {label} ({order})")?;
    match (&chart.bars.value, &chart.bars.error) {
        (Some(bars), _) => {
            if let Some(avg) = bars.national_avg {
                writeln!(out, "  national avg {}", format_dollars(avg))?;
            }
            if let Some(avg) = bars.state_avg {
                writeln!(out, "  state avg    {}", format_dollars(avg))?;
            }
            for (i, p) in bars.providers.iter().enumerate() {
                writeln!(
                    out,
                    "{:>4}. {:<11} {:<36} {:<3} {} / claim  ({} claims)",
                    i + 1,
                    p.npi,
                    truncate(&p.name, 36),
                    p.state.as_deref().unwrap_or(""),
                    format_dollars(p.avg_per_claim),
                    format_count(p.total_claims)
                )?;
            }
        }
        (None, Some(err)) => error(out, "reimbursement chart", err)?,
        (None, None) => {}
    }
    Ok(())
}

fn map<H: NavigationHistory>(out: &mut String, dashboard: &Dashboard<H>) -> fmt::Result {
    let camera = dashboard.map().camera();
    let layers = dashboard
        .map()
        .layers()
        .iter()
        .map(|l| format!("{:?}: {}", l.kind, l.points.len()))
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(
        out,
        "\nMap @ {:.2}, {:.2} zoom {:.1} ({layers})",
        camera.center.lat, camera.center.lng, camera.zoom
    )
}

fn error(out: &mut String, what: &str, err: &RemoteError) -> fmt::Result {
    writeln!(out, "  {what} unavailable: {err}")
}

fn location(city: Option<&str>, state: Option<&str>) -> String {
    [city, state].into_iter().flatten().collect::<Vec<_>>().join(", ")
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use sd_core::{EventBus, MemoryHistory, NavigableAddress};
    use sd_data::sources::memory::Dataset;
    use sd_data::MemorySource;
    use sd_views::DashboardConfig;
    use std::sync::Arc;
    use tokio::runtime::Handle;

    async fn rendered(href: &str) -> String {
        let dashboard = Dashboard::new(
            Arc::new(MemorySource::new(Dataset::demo())),
            MemoryHistory::new(NavigableAddress::parse(href)),
            DashboardConfig::default(),
            Arc::new(EventBus::new()),
            Handle::current(),
        );
        dashboard.settled().await;
        render(&dashboard).unwrap()
    }

    #[tokio::test]
    async fn test_overview_page() {
        let text = rendered("/?state=OH").await;
        assert!(text.starts_with("/?state=OH\n"));
        assert!(text.contains("Top providers in OH"));
        assert!(text.contains("Top procedures"));
        assert!(text.contains("OH monthly spending"));
        assert!(text.contains("Jan 2023"));
    }

    #[tokio::test]
    async fn test_flagged_provider_page() {
        let text = rendered("/provider/1000031676").await;
        assert!(text.contains("(NPI 1000031676)"));
        assert!(text.contains("EXCLUDED: License revocation"));
        assert!(text.contains("Procedures billed"));
    }

    #[tokio::test]
    async fn test_reimbursement_chart_section() {
        let dashboard = Dashboard::new(
            Arc::new(MemorySource::new(Dataset::demo())),
            MemoryHistory::new(NavigableAddress::parse("/?state=TX")),
            DashboardConfig::default(),
            Arc::new(EventBus::new()),
            Handle::current(),
        );
        dashboard.settled().await;
        assert!(!render(&dashboard).unwrap().contains("Avg reimbursement"));

        dashboard.reimbursement().select("T1019");
        dashboard.reimbursement().set_sort(SortDir::Asc);
        dashboard.settled().await;

        let text = render(&dashboard).unwrap();
        assert!(text.contains("Avg reimbursement per claim: T1019 (lowest)"));
        assert!(text.contains("national avg $"));
        assert!(text.contains("state avg"));
        assert!(text.contains(" / claim"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer name", 10), "a much ...");
    }
}
