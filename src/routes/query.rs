use serde::{Deserialize, Serialize};

/// `?userId=` on the list route.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// `?id=` on the delete route.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct IdQuery {
    #[serde(default)]
    pub id: Option<String>,
}
