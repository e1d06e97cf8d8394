//! Text and byte-string conversions.

use crossbind_core::{ConversionError, DynamicValue, NativeValue};

use crate::conversion::{Conversion, ConversionKind};

pub(crate) fn score_text(value: &DynamicValue) -> Option<Conversion> {
    match value {
        DynamicValue::Text(_) => Some(Conversion::identity()),
        DynamicValue::Bytes(bytes) if std::str::from_utf8(bytes).is_ok() => {
            Some(Conversion::implicit(ConversionKind::BytesToText, Conversion::COST_TEXT_BYTES))
        }
        _ => None,
    }
}

pub(crate) fn text_to_native(value: &DynamicValue) -> Result<NativeValue, ConversionError> {
    match value {
        DynamicValue::Text(text) => Ok(NativeValue::Text(text.clone())),
        DynamicValue::Bytes(bytes) => String::from_utf8(bytes.clone())
            .map(NativeValue::Text)
            .map_err(|_| ConversionError::InvalidUtf8),
        other => Err(ConversionError::mismatch("string", other.type_name())),
    }
}

pub(crate) fn text_to_dynamic(value: NativeValue) -> Result<DynamicValue, ConversionError> {
    match value {
        NativeValue::Text(text) => Ok(DynamicValue::Text(text)),
        other => Err(ConversionError::mismatch("string", other.type_name())),
    }
}

pub(crate) fn score_bytes(value: &DynamicValue) -> Option<Conversion> {
    match value {
        DynamicValue::Bytes(_) => Some(Conversion::identity()),
        DynamicValue::Text(_) => {
            Some(Conversion::implicit(ConversionKind::TextToBytes, Conversion::COST_TEXT_BYTES))
        }
        _ => None,
    }
}

pub(crate) fn bytes_to_native(value: &DynamicValue) -> Result<NativeValue, ConversionError> {
    match value {
        DynamicValue::Bytes(bytes) => Ok(NativeValue::Bytes(bytes.clone())),
        DynamicValue::Text(text) => Ok(NativeValue::Bytes(text.as_bytes().to_vec())),
        other => Err(ConversionError::mismatch("bytes", other.type_name())),
    }
}

pub(crate) fn bytes_to_dynamic(value: NativeValue) -> Result<DynamicValue, ConversionError> {
    match value {
        NativeValue::Bytes(bytes) => Ok(DynamicValue::Bytes(bytes)),
        other => Err(ConversionError::mismatch("bytes", other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_exact() {
        assert!(score_text(&DynamicValue::from("hi")).unwrap().is_exact());
        let native = text_to_native(&DynamicValue::from("hi")).unwrap();
        assert_eq!(native, NativeValue::Text("hi".into()));
    }

    #[test]
    fn utf8_bytes_become_text() {
        let value = DynamicValue::Bytes("héllo".as_bytes().to_vec());
        assert_eq!(score_text(&value).unwrap().kind, ConversionKind::BytesToText);
        assert_eq!(text_to_native(&value).unwrap(), NativeValue::Text("héllo".into()));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let value = DynamicValue::Bytes(vec![0xff, 0xfe]);
        assert!(score_text(&value).is_none());
        assert_eq!(text_to_native(&value).unwrap_err(), ConversionError::InvalidUtf8);
    }

    #[test]
    fn text_becomes_bytes() {
        let value = DynamicValue::from("abc");
        assert_eq!(score_bytes(&value).unwrap().kind, ConversionKind::TextToBytes);
        assert_eq!(bytes_to_native(&value).unwrap(), NativeValue::Bytes(b"abc".to_vec()));
    }

    #[test]
    fn native_text_stays_text() {
        let text = text_to_dynamic(NativeValue::Text("x".into())).unwrap();
        assert_eq!(text, DynamicValue::from("x"));
        assert!(text_to_dynamic(NativeValue::Bytes(vec![1])).is_err());
        let bytes = bytes_to_dynamic(NativeValue::Bytes(vec![1])).unwrap();
        assert_eq!(bytes, DynamicValue::Bytes(vec![1]));
    }

    #[test]
    fn numbers_are_not_text() {
        assert!(score_text(&DynamicValue::Int(1)).is_none());
        assert!(score_bytes(&DynamicValue::Int(1)).is_none());
    }
}
