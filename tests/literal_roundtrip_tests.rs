use edgestore::literal::{
    CoordinateValue, LangString, Literal, Number, QuantityValue, canonicalize, decode, encode,
};
use proptest::prelude::*;

fn arb_number() -> impl Strategy<Value = Number> {
    prop_oneof![
        any::<i64>().prop_map(Number::Int),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(Number::Float),
    ]
}

fn arb_quantity() -> impl Strategy<Value = Literal> {
    (
        arb_number(),
        prop::option::of((-1.0e6f64..1.0e6, -1.0e6f64..1.0e6)),
        prop::option::of(prop::sample::select(vec!["kg", "m/s2", "Hz", "Q11573", "Q4917"])),
    )
        .prop_map(|(number, tolerance, unit)| {
            let mut quantity = QuantityValue::new(number);
            if let Some((low, high)) = tolerance {
                quantity = quantity.with_tolerance(low, high);
            }
            if let Some(unit) = unit {
                quantity = quantity.with_unit(unit);
            }
            Literal::Quantity(quantity)
        })
}

fn arb_string() -> impl Strategy<Value = Literal> {
    prop_oneof![
        "\\PC*".prop_map(Literal::Str),
        ("\\PC*", "[a-z]{2,3}", prop::option::of("[A-Z]{2}")).prop_map(
            |(text, language, suffix)| {
                let mut value = LangString::new(text, language);
                value.suffix = suffix;
                Literal::LangStr(value)
            }
        ),
    ]
}

fn arb_coordinate() -> impl Strategy<Value = Literal> {
    (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(lat, lon)| {
        Literal::Coordinate(CoordinateValue::new(lat, lon).unwrap())
    })
}

fn arb_date_text() -> impl Strategy<Value = String> {
    (
        1583i32..=2100,
        1u8..=12,
        1u8..=28,
        0u8..=23,
        0u8..=59,
        0u8..=59,
        prop::sample::select(vec!["", "Z", "+05:30", "-08", "+0100"]),
        prop::option::of(0u8..=19),
    )
        .prop_map(|(year, month, day, hour, minute, second, zone, precision)| {
            let mut text = format!(
                "^{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}{zone}"
            );
            if let Some(precision) = precision {
                text.push_str(&format!("/{precision}"));
            }
            text
        })
}

proptest! {
    #[test]
    fn test_quantities_survive_encode_decode(literal in arb_quantity()) {
        prop_assert_eq!(decode(&encode(&literal)).unwrap(), literal);
    }

    #[test]
    fn test_strings_survive_encode_decode(literal in arb_string()) {
        prop_assert_eq!(decode(&encode(&literal)).unwrap(), literal);
    }

    #[test]
    fn test_coordinates_survive_encode_decode(literal in arb_coordinate()) {
        prop_assert_eq!(decode(&encode(&literal)).unwrap(), literal);
    }

    #[test]
    fn test_decoded_dates_survive_encode_decode(text in arb_date_text()) {
        let literal = decode(&text).unwrap();
        prop_assert_eq!(decode(&encode(&literal)).unwrap(), literal);
    }

    #[test]
    fn test_canonical_form_is_a_fixed_point(text in arb_date_text()) {
        let once = canonicalize(&text).unwrap();
        prop_assert_eq!(canonicalize(&once).unwrap(), once);
    }

    #[test]
    fn test_symbols_decode_verbatim(symbol in "Q[1-9][0-9]{0,6}") {
        prop_assert_eq!(decode(&symbol).unwrap(), Literal::Symbol(symbol.clone()));
        prop_assert_eq!(encode(&Literal::Symbol(symbol.clone())), symbol);
    }
}
