pub const SERVICE: &str = "gamepb.itempb.ItemService";

#[derive(Clone, PartialEq, prost::Message)]
pub struct Item {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(int64, tag = "2")]
    pub count: i64,
    /// Per-stack unique id; zero for virtual counters (gold, exp).
    #[prost(int64, tag = "3")]
    pub uid: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ItemChange {
    #[prost(message, optional, tag = "1")]
    pub item: Option<Item>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ItemNotify {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<ItemChange>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ItemBag {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<Item>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BagRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BagReply {
    #[prost(message, optional, tag = "1")]
    pub item_bag: Option<ItemBag>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SellRequest {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<Item>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SellReply {
    /// What the sale credited, typically a single gold counter.
    #[prost(message, repeated, tag = "1")]
    pub get_items: Vec<Item>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BatchUseItem {
    #[prost(int64, tag = "1")]
    pub item_id: i64,
    #[prost(int64, tag = "2")]
    pub count: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BatchUseRequest {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<BatchUseItem>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BatchUseReply {}
