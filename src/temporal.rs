//! Spanish temporal-expression parsing (C1).
//!
//! Resolves date references embedded in fragment text — exact dates,
//! weekday names, relative phrases, numeric offsets, and ranges — against a
//! reference instant, and normalizes timestamps to a single canonical form
//! for storage.
//!
//! Ported from the reference prototype's `temporal_parser` module; the
//! pattern table, weekday tie-break rule, and canonical normalizer are kept
//! faithful to that source since the rest of the engine (fragment
//! timestamps, edge temporal relevance) depends on exact agreement here.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use regex::Regex;
use std::sync::OnceLock;

/// What kind of reference was matched, carried through so callers can
/// distinguish "this fragment names an exact date" from "this fragment used
/// a relative phrase resolved against some base instant."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    ExactDate,
    DayOfWeek,
    Relative,
    Expression,
    Range,
}

/// One temporal reference found in text.
#[derive(Debug, Clone)]
pub struct TemporalReference {
    pub matched_text: String,
    pub kind: ReferenceKind,
    pub resolved: NaiveDateTime,
}

const WEEKDAYS: [(&str, Weekday); 9] = [
    ("lunes", Weekday::Mon),
    ("martes", Weekday::Tue),
    ("miercoles", Weekday::Wed),
    ("miércoles", Weekday::Wed),
    ("jueves", Weekday::Thu),
    ("viernes", Weekday::Fri),
    ("sabado", Weekday::Sat),
    ("sábado", Weekday::Sat),
    ("domingo", Weekday::Sun),
];

const MONTHS: [(&str, u32); 13] = [
    ("enero", 1),
    ("febrero", 2),
    ("marzo", 3),
    ("abril", 4),
    ("mayo", 5),
    ("junio", 6),
    ("julio", 7),
    ("agosto", 8),
    ("septiembre", 9),
    ("setiembre", 9),
    ("octubre", 10),
    ("noviembre", 11),
    ("diciembre", 12),
];

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(0, 0, 0).unwrap())
}

fn regex_cache() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(Patterns::compile)
}

struct Patterns {
    exact_dmy_slash: Regex,
    exact_dmy_dash: Regex,
    exact_ymd_dash: Regex,
    exact_dm_slash: Regex,
    exact_spanish: Regex,
    weekday: Regex,
    en_n_unidad: Regex,
    dentro_de_n: Regex,
    hace_n: Regex,
    n_atras: Regex,
    ultimos_n: Regex,
    proximas_n: Regex,
}

impl Patterns {
    fn compile() -> Self {
        Self {
            exact_dmy_slash: Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap(),
            exact_dmy_dash: Regex::new(r"\b(\d{1,2})-(\d{1,2})-(\d{4})\b").unwrap(),
            exact_ymd_dash: Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap(),
            exact_dm_slash: Regex::new(r"\b(\d{1,2})/(\d{1,2})\b").unwrap(),
            exact_spanish: Regex::new(
                r"(?i)\b(\d{1,2})\s+de\s+([a-záéíóú]+)(?:\s+de\s+(\d{4}))?\b",
            )
            .unwrap(),
            weekday: Regex::new(
                r"(?i)\b(pasad[oa]\s+|anterior\s+)?(lunes|martes|mi[ée]rcoles|jueves|viernes|s[áa]bado|domingo)(\s+pasad[oa]|\s+anterior)?\b",
            )
            .unwrap(),
            en_n_unidad: Regex::new(r"(?i)\ben\s+(\d+)\s+(d[ií]as?|semanas?|mes(?:es)?)\b").unwrap(),
            dentro_de_n: Regex::new(r"(?i)\bdentro\s+de\s+(\d+)\s+(d[ií]as?|semanas?|mes(?:es)?)\b")
                .unwrap(),
            hace_n: Regex::new(r"(?i)\bhace\s+(\d+)\s+(d[ií]as?|semanas?|mes(?:es)?)\b").unwrap(),
            n_atras: Regex::new(r"(?i)\b(\d+)\s+(d[ií]as?|semanas?|mes(?:es)?)\s+atr[aá]s\b").unwrap(),
            ultimos_n: Regex::new(r"(?i)\blos?\s+[uú]ltimos?\s+(\d+)\s+(d[ií]as?|semanas?)\b").unwrap(),
            proximas_n: Regex::new(r"(?i)\blas?\s+pr[oó]ximas?\s+(\d+)\s+(d[ií]as?|semanas?)\b").unwrap(),
        }
    }
}

fn unit_days(unit: &str) -> i64 {
    let u = unit.to_lowercase();
    if u.starts_with("dia") || u.starts_with("día") || u.starts_with("días") || u.starts_with("dias") {
        1
    } else if u.starts_with("semana") {
        7
    } else {
        30
    }
}

fn month_index(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    MONTHS.iter().find(|(n, _)| *n == lower).map(|(_, m)| *m)
}

/// Resolve the first (or most specific) temporal reference in `text`
/// against `now`. Returns `None` if nothing matched.
pub fn parse_reference(text: &str, now: NaiveDateTime) -> Option<TemporalReference> {
    extract_references(text, now).into_iter().next()
}

/// Find every temporal reference in `text`, resolved against `now`.
///
/// Runs the full pattern table first (exact dates, weekdays, numeric
/// offsets, ranges), then falls back to a permissive single-word/phrase
/// scan for anything the primary patterns missed. Matches are deduplicated
/// by their matched span.
pub fn extract_references(text: &str, now: NaiveDateTime) -> Vec<TemporalReference> {
    let p = regex_cache();
    let mut found: Vec<TemporalReference> = Vec::new();
    let mut seen_spans: Vec<(usize, usize)> = Vec::new();

    macro_rules! push {
        ($m:expr, $r:expr) => {
            let span = ($m.start(), $m.end());
            if !seen_spans.contains(&span) {
                seen_spans.push(span);
                found.push($r);
            }
        };
    }

    for m in p.exact_dmy_slash.find_iter(text) {
        if let Some(cap) = p.exact_dmy_slash.captures(m.as_str()) {
            if let Some(r) = resolve_exact(&cap[1], &cap[2], &cap[3]) {
                push!(m, TemporalReference { matched_text: m.as_str().to_string(), kind: ReferenceKind::ExactDate, resolved: r });
            }
        }
    }
    for m in p.exact_dmy_dash.find_iter(text) {
        if let Some(cap) = p.exact_dmy_dash.captures(m.as_str()) {
            if let Some(r) = resolve_exact(&cap[1], &cap[2], &cap[3]) {
                push!(m, TemporalReference { matched_text: m.as_str().to_string(), kind: ReferenceKind::ExactDate, resolved: r });
            }
        }
    }
    for m in p.exact_ymd_dash.find_iter(text) {
        if let Some(cap) = p.exact_ymd_dash.captures(m.as_str()) {
            if let Some(r) = resolve_exact(&cap[3], &cap[2], &cap[1]) {
                push!(m, TemporalReference { matched_text: m.as_str().to_string(), kind: ReferenceKind::ExactDate, resolved: r });
            }
        }
    }
    for m in p.exact_spanish.find_iter(text) {
        if let Some(cap) = p.exact_spanish.captures(m.as_str()) {
            if let (Ok(day), Some(month)) = (cap[1].parse::<u32>(), month_index(&cap[2])) {
                let year = cap
                    .get(3)
                    .and_then(|y| y.as_str().parse::<i32>().ok())
                    .unwrap_or(now.year());
                if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                    push!(m, TemporalReference { matched_text: m.as_str().to_string(), kind: ReferenceKind::ExactDate, resolved: midnight(date) });
                }
            }
        }
    }
    // dd/mm with no year: only take spans not already covered by dd/mm/yyyy
    for m in p.exact_dm_slash.find_iter(text) {
        let span = (m.start(), m.end());
        if seen_spans.iter().any(|(s, e)| *s <= span.0 && span.1 <= *e) {
            continue;
        }
        if let Some(cap) = p.exact_dm_slash.captures(m.as_str()) {
            if let (Ok(day), Ok(month)) = (cap[1].parse::<u32>(), cap[2].parse::<u32>()) {
                if let Some(date) = NaiveDate::from_ymd_opt(now.year(), month, day) {
                    push!(m, TemporalReference { matched_text: m.as_str().to_string(), kind: ReferenceKind::ExactDate, resolved: midnight(date) });
                }
            }
        }
    }

    for m in p.weekday.find_iter(text) {
        if let Some(cap) = p.weekday.captures(m.as_str()) {
            let is_past = cap.get(1).is_some() || cap.get(3).is_some();
            let weekday_name = cap[2].to_lowercase();
            if let Some((_, wd)) = WEEKDAYS.iter().find(|(n, _)| *n == weekday_name) {
                let resolved = resolve_weekday(now, *wd, is_past);
                push!(m, TemporalReference { matched_text: m.as_str().to_string(), kind: ReferenceKind::DayOfWeek, resolved });
            }
        }
    }

    for m in p.en_n_unidad.find_iter(text) {
        if let Some(cap) = p.en_n_unidad.captures(m.as_str()) {
            if let Ok(n) = cap[1].parse::<i64>() {
                let days = n * unit_days(&cap[2]);
                push!(m, TemporalReference { matched_text: m.as_str().to_string(), kind: ReferenceKind::Expression, resolved: now + Duration::days(days) });
            }
        }
    }
    for m in p.dentro_de_n.find_iter(text) {
        if let Some(cap) = p.dentro_de_n.captures(m.as_str()) {
            if let Ok(n) = cap[1].parse::<i64>() {
                let days = n * unit_days(&cap[2]);
                push!(m, TemporalReference { matched_text: m.as_str().to_string(), kind: ReferenceKind::Expression, resolved: now + Duration::days(days) });
            }
        }
    }
    for m in p.hace_n.find_iter(text) {
        if let Some(cap) = p.hace_n.captures(m.as_str()) {
            if let Ok(n) = cap[1].parse::<i64>() {
                let days = n * unit_days(&cap[2]);
                push!(m, TemporalReference { matched_text: m.as_str().to_string(), kind: ReferenceKind::Expression, resolved: now - Duration::days(days) });
            }
        }
    }
    for m in p.n_atras.find_iter(text) {
        if let Some(cap) = p.n_atras.captures(m.as_str()) {
            if let Ok(n) = cap[1].parse::<i64>() {
                let days = n * unit_days(&cap[2]);
                push!(m, TemporalReference { matched_text: m.as_str().to_string(), kind: ReferenceKind::Expression, resolved: now - Duration::days(days) });
            }
        }
    }
    for m in p.ultimos_n.find_iter(text) {
        if let Some(cap) = p.ultimos_n.captures(m.as_str()) {
            if let Ok(n) = cap[1].parse::<i64>() {
                let days = n * unit_days(&cap[2]);
                push!(m, TemporalReference { matched_text: m.as_str().to_string(), kind: ReferenceKind::Range, resolved: now - Duration::days(days) });
            }
        }
    }
    for m in p.proximas_n.find_iter(text) {
        if let Some(cap) = p.proximas_n.captures(m.as_str()) {
            if let Ok(n) = cap[1].parse::<i64>() {
                let days = n * unit_days(&cap[2]);
                push!(m, TemporalReference { matched_text: m.as_str().to_string(), kind: ReferenceKind::Range, resolved: now + Duration::days(days) });
            }
        }
    }

    for (phrase, resolved) in detect_simple_temporal_words(text, now) {
        let span = match text.to_lowercase().find(&phrase) {
            Some(start) => (start, start + phrase.len()),
            None => continue,
        };
        if seen_spans.iter().any(|(s, e)| *s <= span.0 && span.1 <= *e) {
            continue;
        }
        seen_spans.push(span);
        found.push(TemporalReference { matched_text: phrase, kind: ReferenceKind::Relative, resolved });
    }

    found
}

fn resolve_exact(day: &str, month: &str, year: &str) -> Option<NaiveDateTime> {
    let (d, m, y) = (day.parse().ok()?, month.parse().ok()?, year.parse().ok()?);
    NaiveDate::from_ymd_opt(y, m, d).map(midnight)
}

/// Weekday resolution tie-break: no "pasado/anterior" marker resolves to the
/// next occurrence including today (delta 0 is valid — "el lunes" said on a
/// Monday means today); a "pasado"/"anterior" marker resolves to the
/// previous occurrence strictly before today.
fn resolve_weekday(now: NaiveDateTime, target: Weekday, is_past: bool) -> NaiveDateTime {
    let today = now.date();
    let today_idx = today.weekday().num_days_from_monday() as i64;
    let target_idx = target.num_days_from_monday() as i64;

    if is_past {
        let mut delta = target_idx - today_idx;
        if delta >= 0 {
            delta -= 7;
        }
        midnight(today + Duration::days(delta))
    } else {
        let mut delta = target_idx - today_idx;
        if delta < 0 {
            delta += 7;
        }
        midnight(today + Duration::days(delta))
    }
}

/// Permissive scan for single relative words/phrases not covered by the
/// regex pattern table.
fn detect_simple_temporal_words(text: &str, now: NaiveDateTime) -> Vec<(String, NaiveDateTime)> {
    let lower = text.to_lowercase();
    let mut out = Vec::new();
    let today = midnight(now.date());

    let table: &[(&str, i64)] = &[
        ("hoy", 0),
        ("mañana", 1),
        ("ayer", -1),
    ];
    for (word, delta) in table {
        if lower.contains(word) {
            out.push((word.to_string(), today + Duration::days(*delta)));
        }
    }

    let weeks: &[(&str, i64)] = &[
        ("proxima semana", 7),
        ("próxima semana", 7),
        ("semana proxima", 7),
        ("semana próxima", 7),
        ("semana pasada", -7),
        ("la semana pasada", -7),
        ("semana anterior", -7),
        ("esta semana", 0),
    ];
    for (phrase, delta) in weeks {
        if lower.contains(phrase) {
            out.push((phrase.to_string(), today + Duration::days(*delta)));
        }
    }

    let months: &[(&str, i64)] = &[
        ("proximo mes", 30),
        ("próximo mes", 30),
        ("mes proximo", 30),
        ("mes próximo", 30),
        ("mes pasado", -30),
        ("este mes", 0),
    ];
    for (phrase, delta) in months {
        if lower.contains(phrase) {
            out.push((phrase.to_string(), today + Duration::days(*delta)));
        }
    }

    out
}

/// Resolve a fragment's effective timestamp. If the fragment's own text
/// names an exact date or weekday, that wins; a relative/range reference is
/// re-resolved against the conversation's base instant rather than "now";
/// otherwise the conversation's base instant is returned unchanged
/// (including `None` if the conversation itself has no date).
pub fn detect_fragment_timestamp(
    text: &str,
    conversation_base: Option<NaiveDateTime>,
) -> Option<NaiveDateTime> {
    let anchor = conversation_base.unwrap_or_else(|| midnight(chrono::Utc::now().date_naive()));
    let refs = extract_references(text, anchor);

    if let Some(r) = refs
        .iter()
        .find(|r| matches!(r.kind, ReferenceKind::ExactDate | ReferenceKind::DayOfWeek))
    {
        return Some(r.resolved);
    }
    if let Some(r) = refs
        .iter()
        .find(|r| matches!(r.kind, ReferenceKind::Relative | ReferenceKind::Expression | ReferenceKind::Range))
    {
        return Some(r.resolved);
    }

    conversation_base
}

/// Canonical on-disk timestamp format: naive, second precision, no offset.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Strip whatever offset/fractional-second noise a timestamp string carries
/// and format it canonically. Never panics — unparseable input is dropped.
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    parse_iso_datetime_safe(raw).map(|dt| dt.format(CANONICAL_FORMAT).to_string())
}

/// Best-effort parse of a timestamp string, tolerating a trailing `Z`,
/// fractional seconds, and an embedded UTC offset, then falling back
/// through a short list of alternate formats.
pub fn parse_iso_datetime_safe(raw: &str) -> Option<NaiveDateTime> {
    let mut s = raw.trim().to_string();
    if let Some(stripped) = s.strip_suffix('Z') {
        s = stripped.to_string();
    }
    // strip a trailing +HH:MM or -HH:MM offset
    if s.len() > 6 {
        let tail = &s[s.len() - 6..];
        if (tail.starts_with('+') || tail.starts_with('-')) && tail.as_bytes()[3] == b':' {
            s.truncate(s.len() - 6);
        }
    }
    // strip fractional seconds
    if let Some(dot) = s.find('.') {
        s.truncate(dot);
    }

    NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(&s, "%d/%m/%Y %H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map(midnight)
        })
        .or_else(|_| NaiveDate::parse_from_str(&s, "%d/%m/%Y").map(midnight))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fixed_now() -> NaiveDateTime {
        // A Wednesday.
        NaiveDate::from_ymd_opt(2026, 7, 22)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn parses_exact_slash_date() {
        let refs = extract_references("nos vemos el 15/03/2026 para revisar", fixed_now());
        let r = refs.iter().find(|r| r.kind == ReferenceKind::ExactDate).unwrap();
        assert_eq!(r.resolved.date(), NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
    }

    #[test]
    fn parses_spanish_month_name() {
        let refs = extract_references("quedamos el 15 de marzo de 2026", fixed_now());
        let r = refs.iter().find(|r| r.kind == ReferenceKind::ExactDate).unwrap();
        assert_eq!(r.resolved.date(), NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
    }

    #[test]
    fn weekday_without_pasado_takes_next_occurrence_including_today() {
        // fixed_now is a Wednesday; "miercoles" with no "pasado" resolves to today.
        let refs = extract_references("el miercoles revisamos esto", fixed_now());
        let r = refs.iter().find(|r| r.kind == ReferenceKind::DayOfWeek).unwrap();
        assert_eq!(r.resolved.date(), fixed_now().date());
    }

    #[test]
    fn weekday_with_pasado_takes_previous_occurrence() {
        let refs = extract_references("el miercoles pasado lo discutimos", fixed_now());
        let r = refs.iter().find(|r| r.kind == ReferenceKind::DayOfWeek).unwrap();
        assert_eq!(r.resolved.date(), fixed_now().date() - Duration::days(7));
    }

    #[test]
    fn weekday_forward_search_skips_today_when_marked_past_is_absent_but_different_day() {
        // Monday requested on a Wednesday with no "pasado": next Monday (+5 days).
        let refs = extract_references("el lunes tenemos reunion", fixed_now());
        let r = refs.iter().find(|r| r.kind == ReferenceKind::DayOfWeek).unwrap();
        assert_eq!(r.resolved.date(), fixed_now().date() + Duration::days(5));
    }

    #[test]
    fn relative_words_resolve_against_now() {
        let refs = extract_references("hablamos ayer de esto", fixed_now());
        let r = refs.iter().find(|r| r.matched_text == "ayer").unwrap();
        assert_eq!(r.resolved.date(), fixed_now().date() - Duration::days(1));
    }

    #[test]
    fn numeric_offset_en_n_dias() {
        let refs = extract_references("lo revisamos en 3 dias", fixed_now());
        let r = refs.iter().find(|r| r.kind == ReferenceKind::Expression).unwrap();
        assert_eq!(r.resolved.date(), fixed_now().date() + Duration::days(3));
    }

    #[test]
    fn numeric_offset_hace_n_semanas_is_negative() {
        let refs = extract_references("lo dijo hace 2 semanas", fixed_now());
        let r = refs.iter().find(|r| r.kind == ReferenceKind::Expression).unwrap();
        assert_eq!(r.resolved.date(), fixed_now().date() - Duration::days(14));
    }

    #[test]
    fn range_ultimos_n_dias_is_negative() {
        let refs = extract_references("revisar los ultimos 5 dias", fixed_now());
        let r = refs.iter().find(|r| r.kind == ReferenceKind::Range).unwrap();
        assert_eq!(r.resolved.date(), fixed_now().date() - Duration::days(5));
    }

    #[test]
    fn no_match_returns_empty() {
        let refs = extract_references("contenido sin ninguna fecha mencionada", fixed_now());
        assert!(refs.is_empty());
    }

    #[test]
    fn fragment_timestamp_falls_back_to_conversation_base() {
        let base = Some(fixed_now());
        let ts = detect_fragment_timestamp("contenido generico sin fecha", base);
        assert_eq!(ts, base);
    }

    #[test]
    fn fragment_timestamp_prefers_exact_date_in_text() {
        let base = Some(fixed_now());
        let ts = detect_fragment_timestamp("quedamos el 01/01/2027 a confirmar", base).unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
    }

    #[test]
    fn fragment_timestamp_none_when_no_base_and_no_reference() {
        let ts = detect_fragment_timestamp("sin fecha ni referencia", None);
        assert_eq!(ts, None);
    }

    #[test]
    fn normalize_strips_z_and_fractional_seconds() {
        let n = normalize_timestamp("2026-07-22T10:00:00.123456Z").unwrap();
        assert_eq!(n, "2026-07-22T10:00:00");
    }

    #[test]
    fn normalize_strips_offset() {
        let n = normalize_timestamp("2026-07-22T10:00:00+02:00").unwrap();
        assert_eq!(n, "2026-07-22T10:00:00");
    }

    #[test]
    fn normalize_accepts_date_only() {
        let n = normalize_timestamp("2026-07-22").unwrap();
        assert_eq!(n, "2026-07-22T00:00:00");
    }

    #[test]
    fn normalize_returns_none_for_garbage() {
        assert!(normalize_timestamp("not a date").is_none());
    }
}
