//! Fragmenter (C4): splits a conversation's raw text into semantically
//! coherent fragments and classifies each one's context type.
//!
//! Ported from `fragmentador.py`'s `criterio_fragmentacion_semantica` /
//! `fragmentar_conversacion` / `_detectar_tipo_fragmento`, in semantics
//! rather than syntax: speaker-turn detection, greedy word-count
//! accumulation, a paragraph-based fallback, and keyword-count context-type
//! scoring.

use crate::keywords::extract_keywords;
use crate::model::{ContextType, ConversationId, DocumentOrigin, Fragment};
use crate::temporal::detect_fragment_timestamp;
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::OnceLock;

const DEFAULT_MAX_WORDS: usize = 300;
const DEFAULT_MIN_WORDS: usize = 50;

fn separator_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[-*=]{3,}\n|\n\s*[-*=]{3,}\s*\n").unwrap())
}

fn speaker_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\s*-?\s*[A-ZÁÉÍÓÚ][a-záéíóúñ ]+:|^\[\d+:\d+\]\s*[A-ZÁÉÍÓÚ][a-záéíóúñ ]+:)")
            .unwrap()
    })
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split conversation text into semantically coherent text blocks, before
/// any fragment metadata (keywords, timestamp, type) is attached.
///
/// Public so the ingest layer and `api::parse_preview` can show the raw
/// split without paying for full fragment construction.
pub fn criterio_fragmentacion_semantica(
    text: &str,
    max_words: usize,
    min_words: usize,
) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let mut final_fragments: Vec<String> = Vec::new();

    for block in separator_pattern().split(text) {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }

        let mut current: Vec<&str> = Vec::new();
        let mut current_words = 0usize;

        for line in block.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let line_words = word_count(line);

            if speaker_pattern().is_match(line) && !current.is_empty() {
                if current_words >= min_words || current_words + line_words > max_words {
                    let fragment_text = current.join("\n").trim().to_string();
                    if current_words >= 10 {
                        final_fragments.push(fragment_text);
                    }
                    current = vec![line];
                    current_words = line_words;
                } else {
                    current.push(line);
                    current_words += line_words;
                }
            } else {
                current.push(line);
                current_words += line_words;

                if current_words >= max_words {
                    let fragment_text = current.join("\n").trim().to_string();
                    if current_words >= 10 {
                        final_fragments.push(fragment_text);
                    }
                    current.clear();
                    current_words = 0;
                }
            }
        }

        if !current.is_empty() {
            let fragment_text = current.join("\n").trim().to_string();
            let words = word_count(&fragment_text);

            if words < min_words && !final_fragments.is_empty() {
                let last = final_fragments.last_mut().unwrap();
                last.push('\n');
                last.push_str(&fragment_text);
            } else if words >= 10 {
                final_fragments.push(fragment_text);
            }
        }
    }

    if final_fragments.is_empty() {
        final_fragments = divide_by_paragraphs_and_size(text, max_words);
    }

    // Final cleanup pass: merge anything under 20 words into its
    // predecessor, distinct from the per-block 10-word floor above. A
    // fragment with no predecessor yet is kept regardless of length so a
    // short first (or only) block survives to be merged forward, or to
    // stand on its own if nothing follows it.
    let mut cleaned: Vec<String> = Vec::new();
    for f in final_fragments {
        let f = f.trim().to_string();
        let words = word_count(&f);

        if words < 20 && !cleaned.is_empty() {
            let last = cleaned.last_mut().unwrap();
            last.push('\n');
            last.push_str(&f);
        } else {
            cleaned.push(f);
        }
    }

    // Only drop residual sub-10-word fragments once there's more than one —
    // never discard a whole short conversation's only content.
    if cleaned.len() > 1 {
        cleaned.retain(|f| word_count(f) >= 10);
    }

    cleaned
}

/// Split an over-long paragraph on sentence boundaries, scanning backward
/// from `max_words` to `0.7 * max_words` for a period-terminated token.
fn divide_by_size(text: &str, max_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return vec![text.to_string()];
    }

    let mut fragments = Vec::new();
    let mut start = 0usize;

    while start < words.len() {
        let mut end = (start + max_words).min(words.len());

        if end < words.len() {
            let floor = (start + (max_words as f64 * 0.7) as usize).max(start + 10);
            let mut cut = None;
            let mut i = end;
            while i > floor {
                if words[i - 1].ends_with('.') {
                    cut = Some(i);
                    break;
                }
                i -= 1;
            }
            if let Some(c) = cut {
                end = c;
            }
        }

        fragments.push(words[start..end].join(" "));
        start = end;
    }

    fragments
}

/// Paragraph-based fallback when no speaker pattern fires anywhere: pack
/// blank-line-delimited paragraphs (or single-newline-delimited, if there
/// are no blank lines) greedily under `max_words`.
fn divide_by_paragraphs_and_size(text: &str, max_words: usize) -> Vec<String> {
    let mut paragraphs: Vec<&str> = text.split("\n\n").map(|p| p.trim()).filter(|p| !p.is_empty()).collect();
    if paragraphs.is_empty() {
        paragraphs = text.lines().map(|p| p.trim()).filter(|p| !p.is_empty()).collect();
    }

    let mut fragments = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_words = 0usize;

    for paragraph in paragraphs {
        let paragraph_words = word_count(paragraph);

        if current_words + paragraph_words <= max_words {
            current.push(paragraph);
            current_words += paragraph_words;
        } else {
            if !current.is_empty() {
                fragments.push(current.join("\n\n"));
            }

            if paragraph_words > max_words {
                fragments.extend(divide_by_size(paragraph, max_words));
                current = Vec::new();
                current_words = 0;
            } else {
                current = vec![paragraph];
                current_words = paragraph_words;
            }
        }
    }

    if !current.is_empty() {
        fragments.push(current.join("\n\n"));
    }

    fragments
}

struct TypeCategory {
    context_type: ContextType,
    keywords: &'static [&'static str],
}

// Order matters: it is the declared tie-break order when two categories
// score equally, matching the original's dict-insertion-order `max()`.
const TYPE_CATEGORIES: &[TypeCategory] = &[
    TypeCategory {
        context_type: ContextType::Decision,
        keywords: &["decidimos", "acordamos", "resolveremos", "la decisión", "se decidió", "optamos", "elegimos", "determinamos"],
    },
    TypeCategory {
        context_type: ContextType::Action,
        keywords: &["hacer", "implementar", "ejecutar", "realizar", "completar", "desarrollar", "crear", "construir", "establecer"],
    },
    TypeCategory {
        context_type: ContextType::Question,
        keywords: &["¿", "como", "cómo", "qué", "cuándo", "dónde", "por qué", "cuál", "quién", "cuánto"],
    },
    TypeCategory {
        context_type: ContextType::Conclusion,
        keywords: &["en resumen", "para concluir", "finalmente", "en conclusión", "resumiendo", "concluyendo"],
    },
    TypeCategory {
        context_type: ContextType::Problem,
        keywords: &["problema", "issue", "bug", "error", "falla", "no funciona", "dificultad", "obstáculo", "inconveniente"],
    },
    TypeCategory {
        context_type: ContextType::Task,
        keywords: &["tarea", "pendiente", "debe", "tengo que", "hay que", "asignar", "responsable", "deadline"],
    },
    TypeCategory {
        context_type: ContextType::Event,
        keywords: &["reunión", "meeting", "cita", "evento", "conferencia", "presentación", "demo"],
    },
];

// `temporalidad_fuerte` in the original: maps to `General` with a strong
// temporal hint rather than its own `ContextType` variant (DESIGN.md).
const TEMPORAL_SPECIFIC_KEYWORDS: &[&str] =
    &["mañana", "ayer", "hoy", "próximo", "pasado", "lunes", "martes", "miércoles", "jueves", "viernes"];

/// Classify a fragment's context type by keyword-category match count.
/// Falls back to `inherited` (the conversation's own declared type, if
/// any), then `ContextType::General`.
pub fn detect_fragment_type(text: &str, inherited: Option<ContextType>) -> ContextType {
    let lower = text.to_lowercase();

    let mut best: Option<(ContextType, usize)> = None;
    for category in TYPE_CATEGORIES {
        let count = category.keywords.iter().filter(|kw| lower.contains(*kw)).count();
        if count > 0 && best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((category.context_type, count));
        }
    }

    let temporal_count = TEMPORAL_SPECIFIC_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count();
    if temporal_count > 0 {
        let better_than_best = best.map_or(true, |(_, best_count)| temporal_count > best_count);
        if better_than_best {
            return ContextType::General;
        }
    }

    if let Some((context_type, _)) = best {
        return context_type;
    }

    inherited.unwrap_or_default()
}

/// Input to `fragment_conversation`: the text plus the minimal metadata the
/// fragmenter needs (base timestamp, inherited type, optional document
/// origin for the PDF-attachment ingest path).
pub struct FragmentInput<'a> {
    pub conversation_id: ConversationId,
    pub title: &'a str,
    pub text: &'a str,
    pub base_timestamp: Option<NaiveDateTime>,
    pub inherited_type: Option<ContextType>,
    pub document_origin: Option<DocumentOrigin>,
}

/// Segment `input.text` and build a fully-populated `Fragment` per piece:
/// fresh id, extracted keywords, detected timestamp (falling back to the
/// conversation's base timestamp), and a classified context type.
pub fn fragment_conversation(input: FragmentInput) -> Vec<Fragment> {
    fragment_conversation_with(input, DEFAULT_MAX_WORDS, DEFAULT_MIN_WORDS)
}

pub fn fragment_conversation_with(
    input: FragmentInput,
    max_words: usize,
    min_words: usize,
) -> Vec<Fragment> {
    let texts = criterio_fragmentacion_semantica(input.text, max_words, min_words);
    let total = texts.len() as u32;

    texts
        .into_iter()
        .enumerate()
        .map(|(i, fragment_text)| {
            let timestamp = detect_fragment_timestamp(&fragment_text, input.base_timestamp)
                .or(input.base_timestamp);
            let context_type = detect_fragment_type(&fragment_text, input.inherited_type);

            let mut fragment = Fragment::new(input.conversation_id.clone(), input.title, fragment_text.clone());
            fragment.keywords = extract_keywords(&fragment_text);
            fragment.timestamp = timestamp;
            fragment.context_type = context_type;
            fragment.position_in_conversation = i as u32 + 1;
            fragment.total_in_conversation = total;

            if let Some(origin) = input.document_origin.clone() {
                fragment = fragment.with_document_origin(origin);
            }

            fragment
        })
        .collect()
}
