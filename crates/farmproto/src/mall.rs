pub const SERVICE: &str = "gamepb.mallpb.MallService";

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetMallListBySlotTypeRequest {
    #[prost(int32, tag = "1")]
    pub slot_type: i32,
}

/// The mall list nests goods as raw serialized messages; the client decodes
/// each entry lazily since most slots are irrelevant to it.
#[derive(Clone, PartialEq, prost::Message)]
pub struct GetMallListBySlotTypeResponse {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub goods_list: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MallGoods {
    #[prost(int64, tag = "1")]
    pub goods_id: i64,
    /// Nested price message kept opaque; see [`coupon_price`].
    #[prost(bytes = "vec", tag = "2")]
    pub price: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PurchaseRequest {
    #[prost(int64, tag = "1")]
    pub goods_id: i64,
    #[prost(int64, tag = "2")]
    pub count: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PurchaseReply {}

/// Extract the coupon price from a serialized mall price message.
///
/// The price message is never decoded as a struct because its full schema
/// drifts between client versions; field 2 (varint) is the coupon price and
/// is the only stable part. Unknown length-delimited fields are skipped,
/// anything else aborts the walk.
pub fn coupon_price(data: &[u8]) -> i32 {
    let mut i = 0usize;
    while i < data.len() {
        let tag = data[i] as u32;
        i += 1;
        let field_number = tag >> 3;
        let wire_type = tag & 0x07;
        match wire_type {
            0 => {
                let (val, n) = decode_varint(&data[i..]);
                i += n;
                if field_number == 2 {
                    return val as i32;
                }
            }
            2 => {
                let (len, n) = decode_varint(&data[i..]);
                i += n;
                i += len as usize;
            }
            _ => return 0,
        }
    }
    0
}

fn decode_varint(data: &[u8]) -> (u64, usize) {
    let mut val = 0u64;
    let mut shift = 0u32;
    for (i, b) in data.iter().enumerate() {
        val |= u64::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            return (val, i + 1);
        }
        shift += 7;
        if shift >= 64 {
            return (val, i + 1);
        }
    }
    (val, data.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coupon_price_reads_field_two() {
        // field 1 varint 7, field 2 varint 60
        assert_eq!(coupon_price(&[0x08, 0x07, 0x10, 0x3c]), 60);
    }

    #[test]
    fn coupon_price_skips_length_delimited_fields() {
        // field 3 bytes "abc", then field 2 varint 300
        assert_eq!(coupon_price(&[0x1a, 0x03, b'a', b'b', b'c', 0x10, 0xac, 0x02]), 300);
    }

    #[test]
    fn coupon_price_tolerates_garbage() {
        assert_eq!(coupon_price(&[]), 0);
        // wire type 5 (fixed32) aborts the walk
        assert_eq!(coupon_price(&[0x0d, 0x01, 0x02]), 0);
        // truncated varint
        assert_eq!(coupon_price(&[0x10, 0x80]), 0);
    }

    #[test]
    fn varint_multi_byte() {
        assert_eq!(decode_varint(&[0xac, 0x02]), (300, 2));
        assert_eq!(decode_varint(&[0x01]), (1, 1));
    }
}
