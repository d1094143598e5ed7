//! Solidity bindings for the vault and strategy contracts.
//!
//! Uses alloy's `sol!` macro to generate type-safe ABI encoders/decoders
//! for every call the dashboard makes.

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IVault {
        event Deposit(address indexed sender, address indexed owner, uint256 assets, uint256 shares);
        event Withdraw(address indexed sender, address indexed receiver, address indexed owner, uint256 assets, uint256 shares);

        function asset() external view returns (address);
        function totalAssets() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function convertToShares(uint256 assets) external view returns (uint256);
        function convertToAssets(uint256 shares) external view returns (uint256);
        function deposit(uint256 assets, address receiver) external returns (uint256 shares);
        function withdraw(uint256 assets, address receiver, address owner) external returns (uint256 shares);
        function redeem(uint256 shares, address receiver, address owner) external returns (uint256 assets);
        function paused() external view returns (bool);
    }

    #[sol(rpc)]
    interface IStrategyManager {
        function totalAssetsInStrategies() external view returns (uint256);
        function getStrategyAllocation(address strategy) external view returns (uint256);
        function getStrategies() external view returns (address[] memory);
    }

    #[sol(rpc)]
    interface IStrategy {
        function name() external view returns (string memory);
        function apr() external view returns (uint256);
        function isActive() external view returns (bool);
    }
}
