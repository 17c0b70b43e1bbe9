//! Virial quantities of a halo from its mass and redshift.
//!
//! A halo's virial radius encloses a mean density of 200 times the critical
//! density at its redshift. Every helper returns 0 when an input it divides
//! by or takes a root of is non-positive.

use std::f64::consts::PI;

use galtree_types::{Cosmology, Halo};

/// Overdensity relative to the critical density that defines the virial
/// radius.
pub const OVERDENSITY: f64 = 200.0;

/// Squared Hubble parameter at redshift `z`.
pub fn hubble_of_z_sq(cosmology: &Cosmology, z: f64) -> f64 {
    let zplus1 = 1.0 + z;
    let curvature = 1.0 - cosmology.omega - cosmology.omega_lambda;
    cosmology.hubble.powi(2)
        * (cosmology.omega * zplus1.powi(3) + curvature * zplus1.powi(2) + cosmology.omega_lambda)
}

/// Virial mass of `halo`: its catalogued mass, or the particle count times
/// the particle mass when the catalogue has none.
pub fn virial_mass(halo: &Halo, cosmology: &Cosmology) -> f64 {
    if halo.mvir > 0.0 {
        f64::from(halo.mvir)
    } else {
        f64::from(halo.len) * cosmology.part_mass
    }
}

/// Radius enclosing [`OVERDENSITY`] times the critical density at `z`.
pub fn virial_radius(mvir: f64, z: f64, cosmology: &Cosmology) -> f64 {
    let hubble_sq = hubble_of_z_sq(cosmology, z);
    if mvir <= 0.0 || hubble_sq <= 0.0 || cosmology.gravity <= 0.0 {
        return 0.0;
    }
    let rhocrit = 3.0 * hubble_sq / (8.0 * PI * cosmology.gravity);
    let fac = 1.0 / (OVERDENSITY * 4.0 * PI / 3.0 * rhocrit);
    (mvir * fac).cbrt()
}

/// Circular velocity at the virial radius.
pub fn virial_velocity(mvir: f64, rvir: f64, cosmology: &Cosmology) -> f64 {
    if mvir <= 0.0 || rvir <= 0.0 {
        return 0.0;
    }
    (cosmology.gravity * mvir / rvir).sqrt()
}

/// Narrow a derived quantity to the precision galaxy records store.
#[allow(clippy::cast_possible_truncation)]
pub(crate) const fn narrow(value: f64) -> f32 {
    value as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn hubble_today_is_h0_squared_for_flat_universe() {
        let cosmology = Cosmology::default();
        assert!(close(hubble_of_z_sq(&cosmology, 0.0), 100.0 * 100.0));
    }

    #[test]
    fn hubble_grows_with_redshift() {
        let cosmology = Cosmology::default();
        assert!(hubble_of_z_sq(&cosmology, 2.0) > hubble_of_z_sq(&cosmology, 1.0));
    }

    #[test]
    fn virial_mass_prefers_catalogue() {
        let cosmology = Cosmology::default();
        let halo = Halo::new(0, 100, 12.5);
        assert!(close(virial_mass(&halo, &cosmology), 12.5));
    }

    #[test]
    fn virial_mass_falls_back_to_particles() {
        let cosmology = Cosmology::default();
        let halo = Halo::new(0, 100, 0.0);
        assert!(close(virial_mass(&halo, &cosmology), 100.0 * cosmology.part_mass));
    }

    #[test]
    fn radius_encloses_overdensity() {
        let cosmology = Cosmology::default();
        let mvir = 10.0;
        let rvir = virial_radius(mvir, 0.0, &cosmology);
        assert!(rvir > 0.0);

        let rhocrit = 3.0 * hubble_of_z_sq(&cosmology, 0.0) / (8.0 * PI * cosmology.gravity);
        let mean_density = mvir / (4.0 * PI / 3.0 * rvir.powi(3));
        assert!(close(mean_density, OVERDENSITY * rhocrit));
    }

    #[test]
    fn velocity_matches_circular_orbit() {
        let cosmology = Cosmology::default();
        let v = virial_velocity(4.0, 1.0, &cosmology);
        assert!(close(v, (cosmology.gravity * 4.0).sqrt()));
    }

    #[test]
    fn non_positive_inputs_give_zero() {
        let cosmology = Cosmology::default();
        assert!(close(virial_radius(0.0, 0.0, &cosmology), 0.0));
        assert!(close(virial_radius(-1.0, 0.0, &cosmology), 0.0));
        assert!(close(virial_velocity(1.0, 0.0, &cosmology), 0.0));
        assert!(close(virial_velocity(0.0, 1.0, &cosmology), 0.0));
    }
}
