use rocket::Route;

mod results;
mod tokens;
mod trigger;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(trigger::routes());
    routes.extend(results::routes());
    routes.extend(tokens::routes());
    routes
}
