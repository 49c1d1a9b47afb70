use bevy::math::DVec3;

use crate::bounding_sphere::BoundingSphere;
use crate::cartographic::Cartographic;
use crate::ellipsoid::Ellipsoid;
use crate::intersection_tests::ray_plane;
use crate::oriented_bounding_box::OrientedBoundingBox;
use crate::plane::Plane;
use crate::ray::Ray;
use crate::rectangle::Rectangle;

/// Conservative envelope of a tile: the rectangle between two heights,
/// four outward edge planes anchored at two corners, and the derived box
/// and sphere.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct TileBoundingRegion {
    pub rectangle: Rectangle,
    pub minimum_height: f64,
    pub maximum_height: f64,
    pub southwest_corner_cartesian: DVec3,
    pub northeast_corner_cartesian: DVec3,
    pub west_normal: DVec3,
    pub south_normal: DVec3,
    pub east_normal: DVec3,
    pub north_normal: DVec3,
    pub oriented_bounding_box: Option<OrientedBoundingBox>,
    pub bounding_sphere: Option<BoundingSphere>,
}

impl TileBoundingRegion {
    pub fn new(
        rectangle: Rectangle,
        minimum_height: f64,
        maximum_height: f64,
        ellipsoid: &Ellipsoid,
        compute_bounding_volumes: bool,
    ) -> Self {
        let mut region = Self {
            rectangle,
            minimum_height,
            maximum_height,
            ..Default::default()
        };
        region.compute_box(ellipsoid);
        if compute_bounding_volumes {
            region.compute_bounding_volumes(ellipsoid);
        }
        region
    }

    pub fn bounding_volume(&self) -> Option<&OrientedBoundingBox> {
        self.oriented_bounding_box.as_ref()
    }

    pub fn bounding_sphere(&self) -> Option<&BoundingSphere> {
        self.bounding_sphere.as_ref()
    }

    pub fn compute_bounding_volumes(&mut self, ellipsoid: &Ellipsoid) {
        let obb = OrientedBoundingBox::from_rectangle(
            &self.rectangle,
            self.minimum_height,
            self.maximum_height,
            ellipsoid,
        );
        self.bounding_sphere = Some(BoundingSphere::from_oriented_bounding_box(&obb));
        self.oriented_bounding_box = Some(obb);
    }

    /// Distance from the camera to the region, never less than the distance
    /// to the oriented box when one exists.
    pub fn distance_to_camera(&self, position_wc: DVec3, position_cartographic: &Cartographic) -> f64 {
        let region_result = self.distance_to_camera_region(position_wc, position_cartographic);
        match &self.oriented_bounding_box {
            Some(obb) => {
                use crate::bounding_volume::BoundingVolume;
                region_result.max(obb.distance_squared_to(position_wc).sqrt())
            }
            None => region_result,
        }
    }

    pub fn distance_to_camera_region(
        &self,
        position_wc: DVec3,
        position_cartographic: &Cartographic,
    ) -> f64 {
        let mut result = 0.0;
        if !self.rectangle.contains(position_cartographic) {
            let from_southwest = position_wc - self.southwest_corner_cartesian;
            let distance_to_west_plane = from_southwest.dot(self.west_normal);
            let distance_to_south_plane = from_southwest.dot(self.south_normal);

            let from_northeast = position_wc - self.northeast_corner_cartesian;
            let distance_to_east_plane = from_northeast.dot(self.east_normal);
            let distance_to_north_plane = from_northeast.dot(self.north_normal);

            if distance_to_west_plane > 0.0 {
                result += distance_to_west_plane * distance_to_west_plane;
            } else if distance_to_east_plane > 0.0 {
                result += distance_to_east_plane * distance_to_east_plane;
            }

            if distance_to_south_plane > 0.0 {
                result += distance_to_south_plane * distance_to_south_plane;
            } else if distance_to_north_plane > 0.0 {
                result += distance_to_north_plane * distance_to_north_plane;
            }
        }

        let camera_height = position_cartographic.height;
        if camera_height > self.maximum_height {
            let above = camera_height - self.maximum_height;
            result += above * above;
        } else if camera_height < self.minimum_height {
            let below = self.minimum_height - camera_height;
            result += below * below;
        }

        result.sqrt()
    }

    fn compute_box(&mut self, ellipsoid: &Ellipsoid) {
        let rectangle = self.rectangle;
        self.southwest_corner_cartesian = ellipsoid.cartographic_to_cartesian(&rectangle.south_west());
        self.northeast_corner_cartesian = ellipsoid.cartographic_to_cartesian(&rectangle.north_east());

        let middle_latitude = (rectangle.south + rectangle.north) * 0.5;
        let western_midpoint = ellipsoid
            .cartographic_to_cartesian(&Cartographic::new(rectangle.west, middle_latitude, 0.0));
        let west_normal = western_midpoint.cross(DVec3::Z);
        self.west_normal = west_normal.normalize();

        let eastern_midpoint = ellipsoid
            .cartographic_to_cartesian(&Cartographic::new(rectangle.east, middle_latitude, 0.0));
        self.east_normal = DVec3::Z.cross(eastern_midpoint).normalize();

        let mut west_vector = western_midpoint - eastern_midpoint;
        if west_vector.length() == 0.0 {
            west_vector = west_normal;
        }
        let east_west_normal = west_vector.normalize();
        let middle_longitude = (rectangle.west + rectangle.east) * 0.5;

        // Edge planes of tiles away from the equator would cut through the
        // tile at the far corner, so they are tilted using the edge midpoint.
        let south_surface_normal = if rectangle.south > 0.0 {
            let south_center = ellipsoid
                .cartographic_to_cartesian(&Cartographic::new(middle_longitude, rectangle.south, 0.0));
            let west_plane = Plane::from_point_normal(self.southwest_corner_cartesian, self.west_normal);
            if let Some(corner) = ray_plane(&Ray::new(south_center, east_west_normal), &west_plane) {
                self.southwest_corner_cartesian = corner;
            }
            ellipsoid
                .geodetic_surface_normal(south_center)
                .unwrap_or_else(|| south_center.normalize())
        } else {
            ellipsoid.geodetic_surface_normal_cartographic(&rectangle.south_east())
        };
        self.south_normal = south_surface_normal.cross(west_vector).normalize();

        let north_surface_normal = if rectangle.north < 0.0 {
            let north_center = ellipsoid
                .cartographic_to_cartesian(&Cartographic::new(middle_longitude, rectangle.north, 0.0));
            let east_plane = Plane::from_point_normal(self.northeast_corner_cartesian, self.east_normal);
            if let Some(corner) = ray_plane(&Ray::new(north_center, -east_west_normal), &east_plane) {
                self.northeast_corner_cartesian = corner;
            }
            ellipsoid
                .geodetic_surface_normal(north_center)
                .unwrap_or_else(|| north_center.normalize())
        } else {
            ellipsoid.geodetic_surface_normal_cartographic(&rectangle.north_west())
        };
        self.north_normal = west_vector.cross(north_surface_normal).normalize();
    }
}
