use crate::*;
use num_enum::TryFromPrimitive;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// First byte of every framed message
#[derive(Copy, Clone, Debug, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Encoding {
    Json = 0,
    Cbor = 1,
}

/// The three request streams a node consumes
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Generation,
    Decryption,
    Exponentiation,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Generation => "generation",
            MessageKind::Decryption => "decryption",
            MessageKind::Exponentiation => "exponentiation",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generation" => Ok(MessageKind::Generation),
            "decryption" => Ok(MessageKind::Decryption),
            "exponentiation" => Ok(MessageKind::Exponentiation),
            _ => Err(Error::UnknownMessageKind(s.to_owned())),
        }
    }
}

/// Unpack a framed message: one tag byte, then the body in that encoding
pub fn decode_message<T: DeserializeOwned>(bytes: &[u8]) -> Result<(Encoding, T), Error> {
    let (tag, body) = bytes.split_first().ok_or(Error::EmptyMessage)?;
    let encoding = Encoding::try_from_primitive(*tag).map_err(|_| Error::UnknownEncoding(*tag))?;
    let value = match encoding {
        Encoding::Json => serde_json::from_slice(body)?,
        Encoding::Cbor => serde_cbor::from_slice(body)?,
    };
    Ok((encoding, value))
}

/// Pack a message into a frame
pub fn encode_message<T: Serialize>(encoding: Encoding, value: &T) -> Result<Vec<u8>, Error> {
    let mut bytes = vec![encoding as u8];
    match encoding {
        Encoding::Json => serde_json::to_writer(&mut bytes, value)?,
        Encoding::Cbor => serde_cbor::to_writer(&mut bytes, value)?,
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Ping {
        id: u32,
    }

    #[test]
    fn tag_byte_selects_the_encoding() {
        let json = encode_message(Encoding::Json, &Ping { id: 7 }).unwrap();
        assert_eq!(json[0], 0);
        assert_eq!(&json[1..], br#"{"id":7}"#);

        let cbor = encode_message(Encoding::Cbor, &Ping { id: 7 }).unwrap();
        assert_eq!(cbor[0], 1);

        let (encoding, ping): (Encoding, Ping) = decode_message(&cbor).unwrap();
        assert_eq!(encoding, Encoding::Cbor);
        assert_eq!(ping, Ping { id: 7 });
    }

    #[test]
    fn bad_frames_are_errors() {
        assert!(matches!(decode_message::<Ping>(&[]), Err(Error::EmptyMessage)));
        assert!(matches!(
            decode_message::<Ping>(&[9, b'{', b'}']),
            Err(Error::UnknownEncoding(9))
        ));
        assert!(decode_message::<Ping>(&[0, b'{']).is_err());
    }

    #[test]
    fn message_kinds_parse() {
        assert_eq!("decryption".parse::<MessageKind>().unwrap(), MessageKind::Decryption);
        assert!("vote".parse::<MessageKind>().is_err());
    }
}
