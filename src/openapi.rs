use crate::error::ApiErrorBody;
use crate::hotels::Hotel;
use crate::models::{
    Account, AccountProfile, Comment, CommentTarget, Destination, Journal, LoginRequest, Mood, NewComment,
    NewDestination, NewJournal, NewTrip, Photo, Provider, SignupRequest, Trip, UpdateAccount, UpdateComment,
    UpdateDestination, UpdateJournal, UpdateTrip,
};
use crate::routes;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health,
        routes::auth::signup,
        routes::auth::login,
        routes::auth::get_user,
        routes::auth::update_user,
        routes::auth::search_users,
        routes::auth::google_login,
        routes::auth::google_callback,
        routes::trips::create_trip,
        routes::trips::list_trips,
        routes::trips::get_trip,
        routes::trips::update_trip,
        routes::trips::delete_trip,
        routes::destinations::create_destination,
        routes::destinations::list_destinations,
        routes::destinations::get_destination,
        routes::destinations::update_destination,
        routes::destinations::delete_destination,
        routes::journals::create_journal,
        routes::journals::list_journals,
        routes::journals::get_journal,
        routes::journals::update_journal,
        routes::journals::delete_journal,
        routes::photos::upload_photo,
        routes::photos::list_photos,
        routes::photos::delete_photo,
        routes::comments::create_comment,
        routes::comments::list_comments,
        routes::comments::update_comment,
        routes::comments::delete_comment,
        routes::follow::follow,
        routes::follow::unfollow,
        routes::hotels::search_hotels,
    ),
    components(schemas(
        ApiErrorBody, Account, AccountProfile, Provider, SignupRequest, LoginRequest, UpdateAccount,
        Trip, NewTrip, UpdateTrip, Destination, NewDestination, UpdateDestination,
        Journal, NewJournal, UpdateJournal, Mood, Photo, Comment, NewComment, UpdateComment,
        CommentTarget, Hotel,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Accounts, login and people search"),
        (name = "trips", description = "Trips and everything nested under them"),
        (name = "social", description = "Comments and follows"),
    )
)]
pub struct ApiDoc;
