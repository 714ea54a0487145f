//! Exchange listing formats and the built-in fallback lists used when a
//! listing cannot be fetched.

use crate::models::Company;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use url::Url;

// ── Euronext (Oslo) ───────────────────────────────────────────────────────────

/// Euronext's `;`-separated export with `Symbol` and `Name` columns.
pub fn parse_euronext_csv(text: &str, exchange: &str, suffix: &str) -> Result<Vec<Company>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers().context("listing has no header row")?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    let symbol_col = column("symbol").context("listing has no Symbol column")?;
    let name_col = column("name");

    let mut rows = Vec::new();
    for record in reader.records().filter_map(|r| r.ok()) {
        let symbol = record.get(symbol_col).unwrap_or_default();
        let name = name_col.and_then(|c| record.get(c)).unwrap_or_default();
        rows.push((symbol.to_string(), name.to_string()));
    }
    Ok(to_companies(rows, exchange, suffix))
}

// ── Nasdaq Nordic (Stockholm, Copenhagen) ────────────────────────────────────

#[derive(Debug, Deserialize)]
struct NasdaqResponse {
    #[serde(default)]
    data: Option<NasdaqData>,
}

#[derive(Debug, Deserialize)]
struct NasdaqData {
    #[serde(default)]
    rows: Vec<NasdaqRow>,
}

#[derive(Debug, Deserialize)]
struct NasdaqRow {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    name: String,
}

pub fn nasdaq_instruments_url(base: &str, market: &str) -> Result<Url> {
    Url::parse_with_params(base, &[("assetClass", "shares"), ("market", market)])
        .with_context(|| format!("bad listing url {}", base))
}

/// Instruments API response: `data.rows[].symbol` / `.name`.
pub fn parse_nasdaq_json(text: &str, exchange: &str, suffix: &str) -> Result<Vec<Company>> {
    let resp: NasdaqResponse = serde_json::from_str(text).context("invalid instruments response")?;
    let rows = resp
        .data
        .map(|d| d.rows)
        .unwrap_or_default()
        .into_iter()
        .map(|r| (r.symbol, r.name));
    Ok(to_companies(rows, exchange, suffix))
}

/// Drops blank symbols and repeats, keeping listing order.
fn to_companies(
    rows: impl IntoIterator<Item = (String, String)>,
    exchange: &str,
    suffix: &str,
) -> Vec<Company> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|(symbol, _)| {
            let s = symbol.trim();
            !s.is_empty() && !s.eq_ignore_ascii_case("nan") && seen.insert(s.to_string())
        })
        .map(|(symbol, name)| Company::new(&symbol, &name, exchange, suffix))
        .collect()
}

// ── Fallbacks ─────────────────────────────────────────────────────────────────

const OSLO: &[(&str, &str)] = &[
    ("EQNR", "Equinor"),
    ("DNB", "DNB Bank"),
    ("TEL", "Telenor"),
    ("MOWI", "Mowi"),
    ("ORK", "Orkla"),
    ("YAR", "Yara International"),
    ("SALM", "SalMar"),
    ("AKRBP", "Aker BP"),
    ("NHY", "Norsk Hydro"),
    ("SUBC", "Subsea 7"),
    ("TOM", "Tomra Systems"),
    ("AKSO", "Aker Solutions"),
    ("KOG", "Kongsberg Gruppen"),
    ("SCATC", "Scatec"),
    ("BWO", "BW Offshore"),
];

const STOCKHOLM: &[(&str, &str)] = &[
    // Large cap
    ("VOLV-B", "Volvo"),
    ("ERIC-B", "Ericsson"),
    ("ATCO-A", "Atlas Copco A"),
    ("ATCO-B", "Atlas Copco B"),
    ("ASSA-B", "Assa Abloy"),
    ("SEB-A", "SEB"),
    ("SWED-A", "Swedbank"),
    ("HM-B", "H&M"),
    ("SAND", "Sandvik"),
    ("SKF-B", "SKF"),
    ("INVE-B", "Investor"),
    ("SHB-A", "Handelsbanken"),
    ("ESSITY-B", "Essity"),
    ("HEXA-B", "Hexagon"),
    ("ALFA", "Alfa Laval"),
    ("ELUX-B", "Electrolux"),
    ("TEL2-B", "Tele2"),
    ("KINV-B", "Kinnevik"),
    ("BOL", "Boliden"),
    ("SSAB-A", "SSAB"),
    ("TELIA", "Telia"),
    ("NIBE-B", "NIBE Industrier"),
    ("SWMA", "Swedish Match"),
    ("GETI-B", "Getinge"),
    ("SECU-B", "Securitas"),
    ("LATO-B", "Latour"),
    ("SAAB-B", "Saab"),
    ("LIFCO-B", "Lifco"),
    ("SOBI", "Swedish Orphan Biovitrum"),
    ("EVO", "Evolution"),
    // Mid cap
    ("BETS-B", "Betsson"),
    ("ADDV-B", "AddLife"),
    ("DUNI", "Duni"),
    ("EPRO-B", "Elekta"),
    ("HUFV-A", "Hufvudstaden"),
    ("HUSQ-B", "Husqvarna"),
    ("INTRUM", "Intrum"),
    ("JM", "JM"),
    ("LUND-B", "Lundbergforetagen"),
    ("MYCR", "Mycronic"),
    ("NCC-B", "NCC"),
    ("PEAB-B", "Peab"),
    ("RATO-B", "Ratos"),
    ("RESURS", "Resurs Holding"),
    ("SECT-B", "Sectra"),
    ("STE-R", "Storskogen"),
    ("SWEC-B", "Sweco"),
    ("TREL-B", "Trelleborg"),
    ("WIHL", "Wihlborgs"),
];

const COPENHAGEN: &[(&str, &str)] = &[
    // Large cap
    ("NOVO-B", "Novo Nordisk"),
    ("MAERSK-B", "Maersk"),
    ("CARL-B", "Carlsberg"),
    ("VWS", "Vestas Wind"),
    ("COLO-B", "Coloplast"),
    ("DSV", "DSV"),
    ("NZYM-B", "Novozymes"),
    ("ORSTED", "Orsted"),
    ("DANSKE", "Danske Bank"),
    ("PNDORA", "Pandora"),
    ("GN", "GN Store Nord"),
    ("DEMANT", "Demant"),
    ("ROCK-B", "Rockwool"),
    ("FLS", "FLSmidth"),
    ("TRYG", "Tryg"),
    ("GMAB", "Genmab"),
    ("AMBU-B", "Ambu"),
    ("JYSK", "Jyske Bank"),
    ("RBREW", "Royal Unibrew"),
    ("SIM", "SimCorp"),
    ("ISS", "ISS"),
    ("DFDS", "DFDS"),
    ("TOP", "Topdanmark"),
    ("CHR", "Chr Hansen"),
    ("BAVA", "Bavarian Nordic"),
    // Mid cap
    ("ALK-B", "ALK-Abello"),
    ("ATEA", "Atea"),
    ("CBRAIN", "cBrain"),
    ("CPHCAP", "Copenhagen Capital"),
    ("DNORD", "D/S Norden"),
    ("GREEN", "GreenMobility"),
    ("HARB-B", "Harboes Bryggeri"),
    ("NKT", "NKT"),
    ("NNIT", "NNIT"),
    ("PAAL-B", "Per Aarsleff"),
    ("RTX", "RTX"),
    ("SCHOUW", "Schouw"),
    ("SPNO", "Spar Nord"),
    ("SYDB", "Sydbank"),
    ("VIA", "Via Equity"),
    ("ZEAL", "Zealand Pharma"),
];

/// Major listed names per exchange. Unknown exchanges have no fallback.
pub fn fallback_companies(exchange: &str, suffix: &str) -> Vec<Company> {
    let list: &[(&str, &str)] = match exchange {
        "oslo" => OSLO,
        "stockholm" => STOCKHOLM,
        "copenhagen" => COPENHAGEN,
        _ => &[],
    };
    list.iter()
        .map(|(symbol, name)| Company::new(symbol, name, exchange, suffix))
        .collect()
}
