//! Sliding-window instrument selection.
//!
//! Out of everything the fetcher reports, only a small rolling window per
//! asset class and timeframe is tracked: the soonest-resolving future events,
//! enough to cover the current window plus the next one(s). Past events,
//! events without a parsable end date, and events missing either outcome
//! token are skipped.

use crate::snapshot::{DiscoveryDocument, RawEvent};
use chrono::{DateTime, Utc};
use polyrec_core::{Instrument, InstrumentId, OutcomeToken, TokenId};
use tracing::debug;

/// Tracked asset classes.
const ASSET_CLASSES: [&str; 2] = ["BTC", "ETH"];

/// Timeframe -> how many future-resolving events to keep (current + next N-1).
const WINDOW_LIMITS: [(&str, usize); 3] = [("1h", 2), ("15m", 2), ("5m", 4)];

/// Select the tracked instrument window from a raw document.
pub fn select_instruments(doc: &DiscoveryDocument, now: DateTime<Utc>) -> Vec<Instrument> {
    let mut instruments = Vec::new();

    for asset_class in ASSET_CLASSES {
        let Some(timeframes) = doc.markets.get(asset_class) else {
            continue;
        };

        for (timeframe, limit) in WINDOW_LIMITS {
            let Some(bucket) = timeframes.get(timeframe) else {
                continue;
            };

            let mut future: Vec<(DateTime<Utc>, &RawEvent)> = bucket
                .events
                .iter()
                .filter_map(|ev| {
                    let end = parse_end_date(ev.end_date.as_deref()?)?;
                    (end > now).then_some((end, ev))
                })
                .collect();
            future.sort_by_key(|(end, _)| *end);

            for (end_date, event) in future.into_iter().take(limit) {
                match build_instrument(asset_class, timeframe, end_date, event) {
                    Some(instrument) => instruments.push(instrument),
                    None => {
                        debug!(
                            asset_class,
                            timeframe,
                            slug = event.event_slug.as_deref().unwrap_or("?"),
                            "Event missing slug or outcome token, skipped"
                        );
                    }
                }
            }
        }
    }

    instruments
}

fn parse_end_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn build_instrument(
    asset_class: &str,
    timeframe: &str,
    end_date: DateTime<Utc>,
    event: &RawEvent,
) -> Option<Instrument> {
    let slug = event.event_slug.as_deref()?;
    let (yes_label, yes) = find_token(event, &["yes", "up"])?;
    let (no_label, no) = find_token(event, &["no", "down"])?;

    Some(Instrument {
        id: InstrumentId::new(asset_class, timeframe, slug),
        end_date,
        tokens: vec![
            OutcomeToken {
                label: yes_label.to_uppercase(),
                token_id: TokenId::new(yes),
            },
            OutcomeToken {
                label: no_label.to_uppercase(),
                token_id: TokenId::new(no),
            },
        ],
    })
}

/// First matching outcome key, with its token id.
fn find_token<'a>(event: &'a RawEvent, keys: &[&'a str]) -> Option<(&'a str, &'a str)> {
    keys.iter().find_map(|key| {
        event
            .tokens
            .get(*key)
            .map(|token| (*key, token.token_id.as_str()))
    })
}
