//! Reduce a `VTIMEZONE` to the observances that matter from a reference instant on.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::timezone::{ObservanceKind, TimezoneDefinition};

/// Minified copy of `definition`, for interpreting times at or after `reference`.
///
/// Keeps every observance that only starts after `reference` or still has an `RDATE` after it,
/// the standard observance with the latest onset, and the daylight observance with the latest
/// onset while daylight saving is still in use. Kept observances lose their onsets before the
/// latest one at `reference`. `TZURL` and extension properties are always removed. If the
/// result doesn't validate, an unchanged copy of `definition` is returned.
pub fn minify(
    definition: &TimezoneDefinition,
    reference: Option<DateTime<Utc>>,
) -> TimezoneDefinition {
    let mut minified = definition.clone();
    minified.url = None;
    minified.properties.retain(|property| !property.is_extension());
    for observance in &mut minified.observances {
        observance.properties.retain(|property| !property.is_extension());
    }

    if let Some(reference) = reference {
        let onsets: Vec<_> =
            minified.observances.iter().map(|o| o.latest_onset(reference)).collect();

        let latest = |kind: ObservanceKind| {
            let mut latest: Option<(usize, DateTime<Utc>)> = None;
            for (index, observance) in minified.observances.iter().enumerate() {
                if let (true, Some(onset)) = (observance.kind == kind, onsets[index]) {
                    if latest.map_or(true, |(_, latest)| onset > latest) {
                        latest = Some((index, onset));
                    }
                }
            }
            latest
        };
        let standard = latest(ObservanceKind::Standard);
        let daylight = latest(ObservanceKind::Daylight).filter(|(index, onset)| {
            let observance = &minified.observances[*index];
            let in_daylight = standard.map_or(true, |(_, standard)| *onset > standard);
            in_daylight
                || observance.next_rule_onset_after(reference).is_some()
                || observance.rdate_onsets().any(|rdate| rdate >= reference)
        });

        let keep: Vec<bool> = (0..minified.observances.len())
            .map(|index| {
                onsets[index].is_none()
                    || minified.observances[index].rdate_onsets().any(|rdate| rdate > reference)
                    || standard.is_some_and(|(kept, _)| kept == index)
                    || daylight.is_some_and(|(kept, _)| kept == index)
            })
            .collect();
        for (observance, onset) in minified.observances.iter_mut().zip(&onsets) {
            if let Some(onset) = onset {
                observance.drop_onsets_before(*onset);
            }
        }
        let mut keep = keep.into_iter();
        minified.observances.retain(|_| keep.next().unwrap_or(true));

        debug!(
            tzid = %minified.id,
            before = definition.observances.len(),
            after = minified.observances.len(),
            "minified timezone"
        );
    }

    match minified.validate() {
        Ok(()) => minified,
        Err(e) => {
            warn!(tzid = %definition.id, error = %e, "minified timezone is invalid, keeping original");
            definition.clone()
        }
    }
}
