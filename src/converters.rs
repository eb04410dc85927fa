//! Pure text transforms applied to words and clipboard selections.
//!
//! Everything here is side-effect free: the service copies text out of the
//! clipboard, runs one of these transforms, and pastes the result back. The
//! layout swap is involutive on the letter alphabets, which is what lets a
//! mistaken correction be undone by triggering it again.
use crate::layout::LayoutTable;
use std::collections::HashMap;

/// Swaps every character between the two layouts, preserving case.
///
/// Characters outside both alphabets pass through unchanged. For the few
/// characters that exist in both alphabets ('.' is a primary and a
/// secondary), the secondary reading wins.
pub fn switch_layout(text: &str, table: &LayoutTable) -> String {
    let mut map: HashMap<char, char> = HashMap::new();
    for (primary, secondary) in table.char_pairs() {
        map.insert(primary, secondary);
    }
    for (primary, secondary) in table.char_pairs() {
        map.insert(secondary, primary);
    }

    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        let lower = ch.to_lowercase().next().unwrap_or(ch);
        match map.get(&lower) {
            Some(&mapped) if ch.is_uppercase() => out.extend(mapped.to_uppercase()),
            Some(&mapped) => out.push(mapped),
            None => out.push(ch),
        }
    }
    out
}

/// Transliterates Cyrillic text to Latin. Unknown characters pass through.
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        let lower = ch.to_lowercase().next().unwrap_or(ch);
        match latin_for(lower) {
            Some(mapped) if ch.is_uppercase() => {
                let mut chars = mapped.chars();
                if let Some(first) = chars.next() {
                    out.extend(first.to_uppercase());
                    out.push_str(chars.as_str());
                }
            }
            Some(mapped) => out.push_str(mapped),
            None => out.push(ch),
        }
    }
    out
}

fn latin_for(ch: char) -> Option<&'static str> {
    Some(match ch {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "yo",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "kh",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' => "",
        'ы' => "y",
        'ь' => "",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        _ => return None,
    })
}

/// Swaps the case of every cased character.
pub fn invert_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_uppercase() {
            out.extend(ch.to_lowercase());
        } else if ch.is_lowercase() {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
    }
    out
}

const UNITS_MASC: [&str; 10] = [
    "", "один", "два", "три", "четыре", "пять", "шесть", "семь", "восемь", "девять",
];
const UNITS_FEM: [&str; 10] = [
    "", "одна", "две", "три", "четыре", "пять", "шесть", "семь", "восемь", "девять",
];
const TEENS: [&str; 10] = [
    "десять",
    "одиннадцать",
    "двенадцать",
    "тринадцать",
    "четырнадцать",
    "пятнадцать",
    "шестнадцать",
    "семнадцать",
    "восемнадцать",
    "девятнадцать",
];
const TENS: [&str; 10] = [
    "",
    "",
    "двадцать",
    "тридцать",
    "сорок",
    "пятьдесят",
    "шестьдесят",
    "семьдесят",
    "восемьдесят",
    "девяносто",
];
const HUNDREDS: [&str; 10] = [
    "",
    "сто",
    "двести",
    "триста",
    "четыреста",
    "пятьсот",
    "шестьсот",
    "семьсот",
    "восемьсот",
    "девятьсот",
];

// Declension forms for the three supported scales, smallest first.
const SCALES: [(bool, [&str; 3]); 3] = [
    (true, ["тысяча", "тысячи", "тысяч"]),
    (false, ["миллион", "миллиона", "миллионов"]),
    (false, ["миллиард", "миллиарда", "миллиардов"]),
];

// Fractional denominators by digit count, singular and plural.
const DENOMINATORS: [(&str, &str); 6] = [
    ("десятая", "десятых"),
    ("сотая", "сотых"),
    ("тысячная", "тысячных"),
    ("десятитысячная", "десятитысячных"),
    ("стотысячная", "стотысячных"),
    ("миллионная", "миллионных"),
];

/// Russian plural form index: 0 singular, 1 paucal, 2 plural.
fn plural_form(n: u64) -> usize {
    let rem100 = n % 100;
    if (11..=14).contains(&rem100) {
        return 2;
    }
    match n % 10 {
        1 => 0,
        2..=4 => 1,
        _ => 2,
    }
}

fn push_triple(words: &mut Vec<String>, n: u64, feminine: bool) {
    let units = if feminine { UNITS_FEM } else { UNITS_MASC };
    let (hundreds, rest) = (n / 100, n % 100);
    if hundreds > 0 {
        words.push(HUNDREDS[hundreds as usize].to_string());
    }
    if (10..20).contains(&rest) {
        words.push(TEENS[(rest - 10) as usize].to_string());
    } else {
        let (tens, ones) = (rest / 10, rest % 10);
        if tens > 0 {
            words.push(TENS[tens as usize].to_string());
        }
        if ones > 0 {
            words.push(units[ones as usize].to_string());
        }
    }
}

/// Spells a non-negative integer in Russian. Supports values up to the
/// milliard scale.
fn spell_integer(n: u64, feminine: bool) -> Option<String> {
    if n >= 1_000_000_000_000 {
        return None;
    }
    if n == 0 {
        return Some("ноль".to_string());
    }

    let groups = [
        n % 1000,
        n / 1000 % 1000,
        n / 1_000_000 % 1000,
        n / 1_000_000_000 % 1000,
    ];

    let mut words: Vec<String> = Vec::new();
    for scale in (0..SCALES.len()).rev() {
        let group = groups[scale + 1];
        if group == 0 {
            continue;
        }
        let (scale_feminine, forms) = SCALES[scale];
        push_triple(&mut words, group, scale_feminine);
        words.push(forms[plural_form(group)].to_string());
    }
    push_triple(&mut words, groups[0], feminine);

    Some(words.join(" "))
}

/// Spells a decimal number in Russian words, the way the number-to-words
/// hotkey expects: "3,14" becomes "три целых четырнадцать сотых".
///
/// Accepts an optional leading minus and either ',' or '.' as the decimal
/// separator. Returns `None` when the text is not a number or is outside the
/// supported range.
pub fn number_to_words(text: &str) -> Option<String> {
    let cleaned = text.trim().replace(',', ".");
    let unsigned = cleaned.strip_prefix('-').unwrap_or(&cleaned);
    if unsigned.is_empty() {
        return None;
    }

    let (int_digits, frac_digits) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (unsigned, ""),
    };
    if !int_digits.chars().all(|c| c.is_ascii_digit())
        || !frac_digits.chars().all(|c| c.is_ascii_digit())
        || (int_digits.is_empty() && frac_digits.is_empty())
    {
        return None;
    }

    let int_value: u64 = if int_digits.is_empty() {
        0
    } else {
        int_digits.parse().ok()?
    };

    let mut spelled = if frac_digits.is_empty() {
        spell_integer(int_value, false)?
    } else {
        if frac_digits.len() > DENOMINATORS.len() {
            return None;
        }
        let frac_value: u64 = frac_digits.parse().ok()?;
        let whole_word = if plural_form(int_value) == 0 {
            "целая"
        } else {
            "целых"
        };
        let (singular, plural) = DENOMINATORS[frac_digits.len() - 1];
        let denominator = if plural_form(frac_value) == 0 {
            singular
        } else {
            plural
        };
        format!(
            "{} {} {} {}",
            spell_integer(int_value, true)?,
            whole_word,
            spell_integer(frac_value, true)?,
            denominator
        )
    };

    if cleaned.starts_with('-') {
        spelled = format!("минус {}", spelled);
    }
    Some(spelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutTable;

    #[test]
    fn switch_layout_should_swap_between_alphabets() {
        let table = LayoutTable::new();
        assert_eq!(switch_layout("ghbdtn", &table), "привет");
        assert_eq!(switch_layout("привет", &table), "ghbdtn");
        assert_eq!(switch_layout("Ghbdtn", &table), "Привет");
    }

    #[test]
    fn switch_layout_should_be_involutive_on_letters() {
        let table = LayoutTable::new();
        for text in ["hello world", "привет мир", "Mixed Текст"] {
            assert_eq!(switch_layout(&switch_layout(text, &table), &table), text);
        }
    }

    #[test]
    fn switch_layout_should_pass_unknown_characters_through() {
        let table = LayoutTable::new();
        assert_eq!(switch_layout("42!", &table), "42!");
    }

    #[test]
    fn transliterate_should_map_cyrillic_to_latin() {
        assert_eq!(transliterate("привет"), "privet");
        assert_eq!(transliterate("Щука"), "Schuka");
        assert_eq!(transliterate("объём"), "obyom");
        assert_eq!(transliterate("already latin"), "already latin");
    }

    #[test]
    fn invert_case_should_swap_case() {
        assert_eq!(invert_case("Hello ПрИвет"), "hELLO пРиВЕТ");
    }

    #[test]
    fn invert_case_should_be_involutive() {
        for text in ["MiXeD CaSe 123", "ПрИвЕт"] {
            assert_eq!(invert_case(&invert_case(text)), text);
        }
    }

    #[test]
    fn number_to_words_should_spell_integers() {
        assert_eq!(number_to_words("0").as_deref(), Some("ноль"));
        assert_eq!(number_to_words("42").as_deref(), Some("сорок два"));
        assert_eq!(
            number_to_words("121").as_deref(),
            Some("сто двадцать один")
        );
        assert_eq!(
            number_to_words("1000").as_deref(),
            Some("одна тысяча")
        );
        assert_eq!(number_to_words("2000").as_deref(), Some("две тысячи"));
        assert_eq!(number_to_words("5000").as_deref(), Some("пять тысяч"));
        assert_eq!(
            number_to_words("1000000").as_deref(),
            Some("один миллион")
        );
    }

    #[test]
    fn number_to_words_should_spell_decimals() {
        assert_eq!(
            number_to_words("3.14").as_deref(),
            Some("три целых четырнадцать сотых")
        );
        assert_eq!(
            number_to_words("1,5").as_deref(),
            Some("одна целая пять десятых")
        );
        assert_eq!(
            number_to_words("0.1").as_deref(),
            Some("ноль целых одна десятая")
        );
    }

    #[test]
    fn number_to_words_should_handle_negative_numbers() {
        assert_eq!(number_to_words("-7").as_deref(), Some("минус семь"));
    }

    #[test]
    fn number_to_words_should_reject_non_numbers() {
        assert_eq!(number_to_words("hello"), None);
        assert_eq!(number_to_words("1.2.3"), None);
        assert_eq!(number_to_words(""), None);
        assert_eq!(number_to_words("1000000000000"), None);
    }
}
