//! DummyJSON record schemas and their warehouse rows.
//!
//! Only `id` is required. Every other field may be absent or `null` and
//! becomes `NULL` in the warehouse, with these exceptions:
//!
//! - missing `images` is stored as `[]`
//! - missing `address`, `bank`, `company`, `crypto` are stored as `{}`
//! - a `birthDate` that is not a `YYYY-M-D` date is stored as `NULL`
//! - missing cart `products` means the cart has no items

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use ecom_extract_core::{
    CartId, CartItemRow, CartRow, ProductId, ProductRow, UserId, UserRow,
};

/// Product from `/products`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: i32,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub rating: Option<Decimal>,
    pub stock: Option<i64>,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub weight: Option<Decimal>,
    pub thumbnail: Option<String>,
    pub images: Option<Value>,
}

impl From<ProductRecord> for ProductRow {
    fn from(p: ProductRecord) -> Self {
        Self {
            id: ProductId::new(p.id),
            title: p.title,
            description: p.description,
            category: p.category,
            price: p.price,
            discount_percentage: p.discount_percentage,
            rating: p.rating,
            stock: p.stock,
            brand: p.brand,
            sku: p.sku,
            weight: p.weight,
            thumbnail: p.thumbnail,
            images: p.images.unwrap_or_else(|| Value::Array(Vec::new())),
        }
    }
}

/// Hair attributes, flattened into two columns.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HairRecord {
    pub color: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// User from `/users`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub maiden_name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub username: Option<String>,
    pub birth_date: Option<String>,
    pub image: Option<String>,
    pub blood_group: Option<String>,
    pub height: Option<Decimal>,
    pub weight: Option<Decimal>,
    pub eye_color: Option<String>,
    pub hair: Option<HairRecord>,
    pub ip: Option<String>,
    pub address: Option<Value>,
    pub mac_address: Option<String>,
    pub university: Option<String>,
    pub bank: Option<Value>,
    pub company: Option<Value>,
    pub ein: Option<String>,
    pub ssn: Option<String>,
    pub user_agent: Option<String>,
    pub crypto: Option<Value>,
    pub role: Option<String>,
}

/// Parse DummyJSON's unpadded `YYYY-M-D` dates.
#[must_use]
pub fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn object_or_empty(value: Option<Value>) -> Value {
    value.unwrap_or_else(|| Value::Object(serde_json::Map::new()))
}

impl From<UserRecord> for UserRow {
    fn from(u: UserRecord) -> Self {
        let hair = u.hair.unwrap_or_default();

        Self {
            id: UserId::new(u.id),
            first_name: u.first_name,
            last_name: u.last_name,
            maiden_name: u.maiden_name,
            age: u.age,
            gender: u.gender,
            email: u.email,
            phone: u.phone,
            username: u.username,
            birth_date: u.birth_date.as_deref().and_then(parse_birth_date),
            image: u.image,
            blood_group: u.blood_group,
            height: u.height,
            weight: u.weight,
            eye_color: u.eye_color,
            hair_color: hair.color,
            hair_type: hair.kind,
            ip: u.ip,
            address: object_or_empty(u.address),
            mac_address: u.mac_address,
            university: u.university,
            bank: object_or_empty(u.bank),
            company: object_or_empty(u.company),
            ein: u.ein,
            ssn: u.ssn,
            user_agent: u.user_agent,
            crypto: object_or_empty(u.crypto),
            role: u.role,
        }
    }
}

/// Line of a cart.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartProductRecord {
    pub id: i32,
    pub title: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<i64>,
    pub total: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub discounted_total: Option<Decimal>,
    pub thumbnail: Option<String>,
}

/// Cart from `/carts`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartRecord {
    pub id: i32,
    pub user_id: Option<i32>,
    pub total: Option<Decimal>,
    pub discounted_total: Option<Decimal>,
    pub total_products: Option<i64>,
    pub total_quantity: Option<i64>,
    pub products: Option<Vec<CartProductRecord>>,
}

impl CartRecord {
    /// Split into the cart row and one row per line.
    #[must_use]
    pub fn into_rows(self) -> (CartRow, Vec<CartItemRow>) {
        let cart_id = CartId::new(self.id);

        let items = self
            .products
            .unwrap_or_default()
            .into_iter()
            .map(|p| CartItemRow {
                cart_id,
                product_id: ProductId::new(p.id),
                title: p.title,
                price: p.price,
                quantity: p.quantity,
                total: p.total,
                discount_percentage: p.discount_percentage,
                discounted_total: p.discounted_total,
                thumbnail: p.thumbnail,
            })
            .collect();

        let cart = CartRow {
            id: cart_id,
            user_id: self.user_id.map(UserId::new),
            total: self.total,
            discounted_total: self.discounted_total,
            total_products: self.total_products,
            total_quantity: self.total_quantity,
        };

        (cart, items)
    }
}
