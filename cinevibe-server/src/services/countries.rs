//! Reviewer country names to ISO 3166-1 alpha-2 codes
//!
//! Profiles store free-text country names, in English or Russian.

const COUNTRY_CODES: &[(&str, &str)] = &[
    ("russia", "RU"),
    ("россия", "RU"),
    ("united states", "US"),
    ("usa", "US"),
    ("сша", "US"),
    ("united kingdom", "GB"),
    ("uk", "GB"),
    ("великобритания", "GB"),
    ("germany", "DE"),
    ("германия", "DE"),
    ("france", "FR"),
    ("франция", "FR"),
    ("italy", "IT"),
    ("италия", "IT"),
    ("spain", "ES"),
    ("испания", "ES"),
    ("japan", "JP"),
    ("япония", "JP"),
    ("china", "CN"),
    ("китай", "CN"),
    ("south korea", "KR"),
    ("korea", "KR"),
    ("южная корея", "KR"),
    ("canada", "CA"),
    ("канада", "CA"),
    ("australia", "AU"),
    ("австралия", "AU"),
    ("brazil", "BR"),
    ("бразилия", "BR"),
    ("india", "IN"),
    ("индия", "IN"),
    ("mexico", "MX"),
    ("мексика", "MX"),
    ("poland", "PL"),
    ("польша", "PL"),
    ("ukraine", "UA"),
    ("украина", "UA"),
    ("belarus", "BY"),
    ("беларусь", "BY"),
    ("kazakhstan", "KZ"),
    ("казахстан", "KZ"),
    ("netherlands", "NL"),
    ("нидерланды", "NL"),
    ("sweden", "SE"),
    ("швеция", "SE"),
    ("norway", "NO"),
    ("норвегия", "NO"),
    ("finland", "FI"),
    ("финляндия", "FI"),
    ("denmark", "DK"),
    ("дания", "DK"),
    ("turkey", "TR"),
    ("турция", "TR"),
    ("argentina", "AR"),
    ("аргентина", "AR"),
    ("czech republic", "CZ"),
    ("czechia", "CZ"),
    ("чехия", "CZ"),
    ("austria", "AT"),
    ("австрия", "AT"),
    ("switzerland", "CH"),
    ("швейцария", "CH"),
    ("belgium", "BE"),
    ("бельгия", "BE"),
    ("portugal", "PT"),
    ("португалия", "PT"),
    ("greece", "GR"),
    ("греция", "GR"),
    ("israel", "IL"),
    ("израиль", "IL"),
    ("united arab emirates", "AE"),
    ("uae", "AE"),
    ("оаэ", "AE"),
    ("singapore", "SG"),
    ("сингапур", "SG"),
    ("taiwan", "TW"),
    ("тайвань", "TW"),
    ("thailand", "TH"),
    ("таиланд", "TH"),
    ("vietnam", "VN"),
    ("вьетнам", "VN"),
    ("indonesia", "ID"),
    ("индонезия", "ID"),
    ("malaysia", "MY"),
    ("малайзия", "MY"),
    ("philippines", "PH"),
    ("филиппины", "PH"),
    ("new zealand", "NZ"),
    ("новая зеландия", "NZ"),
    ("south africa", "ZA"),
    ("юар", "ZA"),
    ("egypt", "EG"),
    ("египет", "EG"),
    ("saudi arabia", "SA"),
    ("саудовская аравия", "SA"),
];

/// Code for a country name, `"XX"` when unknown
pub fn country_code(name: &str) -> &'static str {
    let needle = name.trim().to_lowercase();
    COUNTRY_CODES
        .iter()
        .find(|(n, _)| *n == needle)
        .map(|(_, code)| *code)
        .unwrap_or("XX")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_and_russian_names() {
        assert_eq!(country_code("Germany"), "DE");
        assert_eq!(country_code("  germany "), "DE");
        assert_eq!(country_code("Россия"), "RU");
        assert_eq!(country_code("USA"), "US");
    }

    #[test]
    fn test_unknown_falls_back() {
        assert_eq!(country_code("Atlantis"), "XX");
        assert_eq!(country_code(""), "XX");
    }
}
