//! Visibility rules applied before an object leaves a store.

use graffiti_types::GraffitiObject;

/// The view of `object` a requester is entitled to.
///
/// The object's actor sees everything. Anyone else sees `allowed` reduced to
/// themselves and `channels` reduced to the ones they asked about, so that
/// neither the full audience nor unrelated channels leak.
pub fn mask_object(
    object: &GraffitiObject,
    requester: Option<&str>,
    queried_channels: &[String],
) -> GraffitiObject {
    if requester == Some(object.actor.as_str()) {
        return object.clone();
    }
    let mut masked = object.clone();
    masked.allowed = object
        .allowed
        .as_ref()
        .map(|_| requester.map(|r| vec![r.to_string()]).unwrap_or_default());
    masked
        .channels
        .retain(|channel| queried_channels.contains(channel));
    masked
}
