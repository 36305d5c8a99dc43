// Stats aggregation: the per-scope summary behind `!rstats` and
// `recycler stats`.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Months, Utc};
use serde::Serialize;

use crate::chat::{Embed, EmbedField};
use crate::error::StoreResult;
use crate::scope::Scope;
use crate::store::FingerprintStore;

/// Colour of the stats card.
const EMBED_COLOUR: u32 = 0x86ff00;

/// A scope's summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub uptime: String,
    pub recycles: u64,
    pub links: u64,
    pub images: u64,
}

impl Report {
    pub fn to_embed(&self) -> Embed {
        let field = |name: &str, value: String| EmbedField {
            name: name.to_string(),
            value,
        };
        Embed {
            author: "Recycler".to_string(),
            colour: EMBED_COLOUR,
            fields: vec![
                field("Uptime", self.uptime.clone()),
                field("Messages Recycled", self.recycles.to_string()),
                field("Links in Database", self.links.to_string()),
                field("Image Hashes in Database", self.images.to_string()),
            ],
        }
    }
}

/// Read-only composition of store counts and process uptime.
pub struct StatsAggregator {
    store: Arc<dyn FingerprintStore>,
    started_at: DateTime<Utc>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn FingerprintStore>, started_at: DateTime<Utc>) -> Self {
        Self { store, started_at }
    }

    pub async fn report(&self, scope: &Scope) -> StoreResult<Report> {
        self.report_at(scope, Utc::now()).await
    }

    pub async fn report_at(&self, scope: &Scope, now: DateTime<Utc>) -> StoreResult<Report> {
        let stats = self.store.stats(scope).await?;
        Ok(Report {
            uptime: format_uptime(self.started_at, now),
            recycles: stats.repost_count,
            links: stats.link_count,
            images: stats.image_count,
        })
    }
}

/// Calendar difference between two instants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Elapsed {
    pub years: u32,
    pub months: u32,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

/// Whole calendar months first (so "1 month" means the same day next
/// month, not 30 days), then the remainder as days/hours/minutes/seconds.
pub fn elapsed(start: DateTime<Utc>, end: DateTime<Utc>) -> Elapsed {
    if end <= start {
        return Elapsed::default();
    }

    let add_months = |n: u32| start.checked_add_months(Months::new(n));

    let month_span = (end.year() - start.year()) * 12 + end.month0() as i32 - start.month0() as i32;
    let mut total_months = month_span.max(0) as u32;
    let mut anchor = add_months(total_months);
    while total_months > 0 && anchor.map_or(true, |a| a > end) {
        total_months -= 1;
        anchor = add_months(total_months);
    }

    let rest = end - anchor.unwrap_or(start);
    Elapsed {
        years: total_months / 12,
        months: total_months % 12,
        days: rest.num_days(),
        hours: rest.num_hours() % 24,
        minutes: rest.num_minutes() % 60,
        seconds: rest.num_seconds() % 60,
    }
}

/// Render uptime as "N years N months N days N hours N minutes N seconds",
/// leaving out zero components. Empty when under a second.
pub fn format_uptime(start: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let e = elapsed(start, now);
    let parts = [
        (i64::from(e.years), "years"),
        (i64::from(e.months), "months"),
        (e.days, "days"),
        (e.hours, "hours"),
        (e.minutes, "minutes"),
        (e.seconds, "seconds"),
    ];

    parts
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| format!("{n} {unit}"))
        .collect::<Vec<_>>()
        .join(" ")
}
