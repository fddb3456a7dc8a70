use axum::response::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::AlertStatus;

/// Product row in the sample inventory listing
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InventoryProduct {
    pub id: u32,
    pub name: String,
    pub current_stock: i64,
    pub status: AlertStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InventoryResponse {
    pub products: Vec<InventoryProduct>,
}

// Static sample; not backed by uploaded stock data
fn sample_inventory() -> Vec<InventoryProduct> {
    [
        (1, "Wireless Headphones", 45, AlertStatus::Safe),
        (2, "Smartphone Charger", 22, AlertStatus::Urgent),
        (3, "Bluetooth Speaker", 18, AlertStatus::Warning),
    ]
    .into_iter()
    .map(|(id, name, current_stock, status)| InventoryProduct {
        id,
        name: name.to_string(),
        current_stock,
        status,
    })
    .collect()
}

/// Sample inventory listing
#[utoipa::path(
    get,
    path = "/api/inventory",
    responses(
        (status = 200, description = "Sample inventory returned", body = InventoryResponse)
    ),
    tag = "inventory"
)]
pub async fn get_inventory() -> Json<InventoryResponse> {
    Json(InventoryResponse {
        products: sample_inventory(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_three_sample_products() {
        let Json(body) = get_inventory().await;
        assert_eq!(body.products.len(), 3);
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["products"][1]["name"], "Smartphone Charger");
        assert_eq!(value["products"][1]["status"], "urgent");
        assert_eq!(value["products"][0]["current_stock"], 45);
    }
}
