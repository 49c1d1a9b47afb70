use bevy::math::DVec3;
use bevy::prelude::Resource;
use quadglobe_scene::{Cartographic, CullingVolume, Ellipsoid, PerspectiveFrustum};

/// Where the viewer is and what it sees, in world coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position_wc: DVec3,
    pub direction_wc: DVec3,
    pub up_wc: DVec3,
    pub position_cartographic: Cartographic,
    /// Origin of the frame the camera moves in. Tiles containing it are
    /// kept loaded even when culled.
    pub reference_frame_origin: DVec3,
    pub frustum: PerspectiveFrustum,
}

impl Camera {
    pub fn new(
        ellipsoid: &Ellipsoid,
        position_wc: DVec3,
        direction_wc: DVec3,
        up_wc: DVec3,
        frustum: PerspectiveFrustum,
    ) -> Self {
        let position_cartographic = ellipsoid
            .cartesian_to_cartographic(position_wc)
            .unwrap_or_default();
        Self {
            position_wc,
            direction_wc: direction_wc.normalize(),
            up_wc: up_wc.normalize(),
            position_cartographic,
            reference_frame_origin: DVec3::ZERO,
            frustum,
        }
    }

    /// A camera at `position_wc` facing `target`, with up as close to the
    /// z axis as the view direction allows.
    pub fn looking_at(
        ellipsoid: &Ellipsoid,
        position_wc: DVec3,
        target: DVec3,
        frustum: PerspectiveFrustum,
    ) -> Self {
        let direction = (target - position_wc).normalize();
        let mut right = direction.cross(DVec3::Z);
        if right.length_squared() < 1e-12 {
            right = direction.cross(DVec3::X);
        }
        let up = right.cross(direction).normalize();
        Self::new(ellipsoid, position_wc, direction, up, frustum)
    }

    pub fn right_wc(&self) -> DVec3 {
        self.direction_wc.cross(self.up_wc).normalize()
    }
}

/// Per-frame input of the quadtree.
#[derive(Resource, Debug, Clone)]
pub struct FrameState {
    pub frame_number: u64,
    pub camera: Camera,
    pub culling_volume: CullingVolume,
    pub drawing_buffer_height: f64,
    pub pixel_ratio: f64,
}

impl FrameState {
    pub fn new(frame_number: u64, camera: Camera, drawing_buffer_height: f64) -> Self {
        let culling_volume = camera.frustum.compute_culling_volume(
            camera.position_wc,
            camera.direction_wc,
            camera.up_wc,
        );
        Self {
            frame_number,
            camera,
            culling_volume,
            drawing_buffer_height,
            pixel_ratio: 1.0,
        }
    }

    /// The following frame seen from `camera`.
    pub fn next(&self, camera: Camera) -> Self {
        let mut next = Self::new(self.frame_number + 1, camera, self.drawing_buffer_height);
        next.pixel_ratio = self.pixel_ratio;
        next
    }
}

#[cfg(test)]
mod tests {
    use quadglobe_scene::{BoundingSphere, Intersect};

    use super::*;

    #[test]
    fn looking_at_builds_orthonormal_frame() {
        let ellipsoid = Ellipsoid::wgs84();
        let camera = Camera::looking_at(
            &ellipsoid,
            DVec3::new(2.0e7, 0.0, 0.0),
            DVec3::ZERO,
            PerspectiveFrustum::default(),
        );
        assert!((camera.direction_wc - DVec3::NEG_X).length() < 1e-12);
        assert!(camera.direction_wc.dot(camera.up_wc).abs() < 1e-12);
        assert!((camera.up_wc - DVec3::Z).length() < 1e-12);
        assert!(camera.position_cartographic.longitude.abs() < 1e-12);
        assert!((camera.position_cartographic.height - (2.0e7 - ellipsoid.radii.x)).abs() < 1e-6);
    }

    #[test]
    fn culling_volume_follows_the_camera() {
        let ellipsoid = Ellipsoid::wgs84();
        let camera = Camera::looking_at(
            &ellipsoid,
            DVec3::new(2.0e7, 0.0, 0.0),
            DVec3::ZERO,
            PerspectiveFrustum::default(),
        );
        let frame_state = FrameState::new(1, camera.clone(), 768.0);
        let in_front = BoundingSphere::new(DVec3::new(1.0e7, 0.0, 0.0), 10.0);
        let behind = BoundingSphere::new(DVec3::new(3.0e7, 0.0, 0.0), 10.0);
        assert_eq!(frame_state.culling_volume.compute_visibility(&in_front), Intersect::Inside);
        assert_eq!(frame_state.culling_volume.compute_visibility(&behind), Intersect::Outside);

        let next = frame_state.next(camera);
        assert_eq!(next.frame_number, 2);
        assert_eq!(next.drawing_buffer_height, 768.0);
    }
}
