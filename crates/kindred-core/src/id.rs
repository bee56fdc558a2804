/// Generates a store-assigned document ID.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
