use std::fmt;
use std::str::FromStr;

/// Screens reachable by path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
  #[default]
  OrderList,
  NewOrder,
  EditOrder(i64),
  Stats,
}

impl Route {
  pub fn path(&self) -> String {
    match self {
      Route::OrderList => "/".to_string(),
      Route::NewOrder => "/orders/new".to_string(),
      Route::EditOrder(id) => format!("/orders/edit/{}", id),
      Route::Stats => "/stats".to_string(),
    }
  }
}

impl fmt::Display for Route {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.path())
  }
}

impl FromStr for Route {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let path = s.trim();
    let path = path.strip_suffix('/').filter(|p| !p.is_empty()).unwrap_or(path);

    match path {
      "" | "/" => Ok(Route::OrderList),
      "/orders/new" => Ok(Route::NewOrder),
      "/stats" => Ok(Route::Stats),
      _ => path
        .strip_prefix("/orders/edit/")
        .and_then(|id| id.parse::<i64>().ok())
        .map(Route::EditOrder)
        .ok_or_else(|| format!("unknown route: {}", s)),
    }
  }
}
