//! Pattern-level quote analysis: figure references, ellipses, domain markers, distinctive phrases.

use once_cell::sync::Lazy;
use regex::Regex;

static FIGURE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:fig(?:ure)?s?\.?|table|chart|graph|plot|image)\s*\d*\b")
        .expect("figure reference regex")
});

static TRAILING_ELLIPSIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\.{3,}|…)+\s*$").expect("trailing ellipsis regex"));

static ELLIPSIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{3,}|…").expect("ellipsis regex"));

/// Curated markers that identify pharmacogenomic content on their own.
static DOMAIN_TERMS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // dbSNP identifiers
        r"(?i)\brs\d{3,}\b",
        // HLA alleles: HLA-B*57:01, HLA-A*31:01
        r"\bHLA-[A-Z]+\d?\*\d{2}(?::\d{2,3})*\b",
        // star alleles: CYP2C19*2, TPMT*3A
        r"\b[A-Z][A-Z0-9]{2,}\*\d+[A-Z]?\b",
        // HGVS cDNA / protein notation
        r"\bc\.\d+(?:[+-]\d+)?[ACGT]>[ACGT]",
        r"\bp\.[A-Z][a-z]{2}\d+(?:[A-Z][a-z]{2}|\*|=)",
        // pharmacogenes
        r"\b(?:CYP\d[A-Z]\d{1,2}|UGT1A1|SLCO1B1|VKORC1|TPMT|DPYD|NUDT15|G6PD|ABCB1|ABCG2|COMT|OPRM1|IFNL3|NAT2|MTHFR|HLA-[A-Z]+\d?)\b",
        // drug classes
        r"\b(?:SSRIs?|SNRIs?|NSAIDs?|PPIs?|TCAs?|ARBs?|DOACs?)\b",
        // doses and concentrations
        r"(?i)\b\d+(?:\.\d+)?\s?(?:mg/kg(?:/day)?|mg/day|mg/dl|mg/l|ng/ml|nmol/l|mmol/l|iu/l|g/dl|ml/min|µg|μg|mg)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("domain term regex"))
    .collect()
});

static CAPITALIZED_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][\w-]*(?:\s+[A-Z][\w-]*)+").expect("capitalized run regex")
});

static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^()]+)\)").expect("parenthetical regex"));

static NUMERIC_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[A-Za-z]+\s+){1,2}\d+(?:\.\d+)?\s?%?").expect("numeric phrase regex")
});

/// Does the quote talk about a figure, table, chart, graph, plot or image?
pub fn is_figure_reference(quote: &str) -> bool {
    FIGURE_REFERENCE.is_match(quote)
}

/// The quote without a trailing ellipsis, if it had one.
pub fn strip_trailing_ellipsis(quote: &str) -> Option<String> {
    let t = quote.trim();
    let m = TRAILING_ELLIPSIS.find(t)?;
    let head = t[..m.start()].trim();
    if head.is_empty() {
        None
    } else {
        Some(head.to_string())
    }
}

/// Non-empty clauses around ellipses (`a ... b` → `[a, b]`); empty when there is no ellipsis.
pub fn ellipsis_clauses(quote: &str) -> Vec<String> {
    if !ELLIPSIS.is_match(quote) {
        return Vec::new();
    }
    ELLIPSIS
        .split(quote)
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .collect()
}

/// Domain markers found in the quote, in quote order, without overlaps (longest wins at a start).
pub fn domain_terms(quote: &str) -> Vec<String> {
    let mut hits: Vec<(usize, usize)> = Vec::new();
    for re in DOMAIN_TERMS.iter() {
        for m in re.find_iter(quote) {
            hits.push((m.start(), m.end()));
        }
    }
    hits.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)));

    let mut out: Vec<String> = Vec::new();
    let mut covered_to = 0usize;
    for (s, e) in hits {
        if s < covered_to {
            continue;
        }
        let term = quote[s..e].to_string();
        if !out.contains(&term) {
            out.push(term);
        }
        covered_to = e;
    }
    out
}

/// True if the whole string is one domain marker.
pub fn is_domain_term(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty()
        && DOMAIN_TERMS
            .iter()
            .any(|re| re.find(s).map(|m| m.start() == 0 && m.end() == s.len()).unwrap_or(false))
}

/// Phrases likely to survive re-rendering verbatim: capitalized runs, the words around domain
/// markers, parenthetical asides, and numeric statements. Longest first.
pub fn distinctive_phrases(quote: &str, min_chars: usize) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut push = |p: &str| {
        let p = p.trim().trim_end_matches(['.', ',', ';', ':']).trim();
        if p.chars().count() >= min_chars && !found.iter().any(|f| f == p) {
            found.push(p.to_string());
        }
    };

    for m in CAPITALIZED_RUN.find_iter(quote) {
        push(m.as_str());
    }
    for term in domain_terms(quote) {
        let pat = format!(r"(?:\S+\s+){{0,2}}{}(?:\s+\S+){{0,2}}", regex::escape(&term));
        if let Ok(re) = Regex::new(&pat) {
            for m in re.find_iter(quote) {
                push(m.as_str());
            }
        }
    }
    for c in PARENTHETICAL.captures_iter(quote) {
        if let Some(inner) = c.get(1) {
            push(inner.as_str());
        }
    }
    for m in NUMERIC_PHRASE.find_iter(quote) {
        push(m.as_str());
    }

    found.sort_by_key(|p| std::cmp::Reverse(p.chars().count()));
    found
}
