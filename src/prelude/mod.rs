pub use crate::{
    core::{
        error::{OdometryError, Result},
        jacobian_cache::{JacobianCache, JacobianCacheBuilder, PrecomputedPoints},
        jacobian_chain::{assign_jacobians, StateJacobian},
        key::{StateKey, StateKind},
        loss_function::{GaussianLoss, LossFunction},
        params::{ExtrapolationPolicy, TransformerParams},
        residual::{Evaluation, Residual, ResidualWorkspace, StateRequest},
        variable::Variable,
    },
    slam::{
        implicit_line::ImplicitLine,
        point_to_line::PointToLine,
        point_to_plane::PointToPlane,
        residual::GeometricResidual,
        se3::SE3,
    },
    trajectory::{
        interpolation::SegmentBlend,
        store::{MotionKnot, Segment, TrajectoryStore},
        transformer::{InterpolatedState, PrecomputedScan, ScanFrame, Transformer},
    },
};
